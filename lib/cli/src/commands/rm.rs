use anyhow::{Context, Result};
use clap::Parser;
use sapi_fs::transport::local;
use sapi_fs::{Dir, File};

#[derive(Debug, Parser)]
/// The options for the `sapi rm` subcommand
pub struct Rm {
    /// File or directory to remove
    #[clap(name = "PATH")]
    path: String,

    /// Remove directories and everything in them
    #[clap(short = 'r', long)]
    recursive: bool,
}

impl Rm {
    /// Runs logic for the `rm` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to remove `{}`", self.path))
    }

    fn inner_execute(&self) -> Result<()> {
        if File::lstat(local(), &self.path)?.is_directory() {
            Dir::remove(local(), &self.path, self.recursive)?;
        } else {
            File::remove(local(), &self.path)?;
        }
        Ok(())
    }
}
