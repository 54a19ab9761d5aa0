use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use sapi_fs::{File, OpenFlags};

#[derive(Debug, Parser)]
/// The options for the `sapi cat` subcommand
pub struct Cat {
    /// File to print
    #[clap(name = "PATH")]
    path: String,
}

impl Cat {
    /// Runs logic for the `cat` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to read `{}`", self.path))
    }

    fn inner_execute(&self) -> Result<()> {
        let mut file = File::new();
        file.open(&self.path, OpenFlags::READ)?;
        let mut stdout = std::io::stdout().lock();
        let mut buf = [0u8; 1024];
        loop {
            let count = file.read(&mut buf)?;
            if count == 0 {
                break;
            }
            stdout.write_all(&buf[..count])?;
        }
        stdout.flush()?;
        file.close()?;
        Ok(())
    }
}
