use anyhow::{Context, Result};
use clap::Parser;
use sapi_fs::transport::local;
use sapi_fs::{Dir, File, path};

#[derive(Debug, Parser)]
/// The options for the `sapi ls` subcommand
pub struct Ls {
    /// Directory to list
    #[clap(name = "PATH", default_value = ".")]
    path: String,

    /// Show the type and size of each entry
    #[clap(short = 'l', long)]
    long: bool,
}

impl Ls {
    /// Runs logic for the `ls` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to list `{}`", self.path))
    }

    fn inner_execute(&self) -> Result<()> {
        let mut names = Dir::list(local(), &self.path)?;
        names.sort();
        for name in names {
            if !self.long {
                println!("{name}");
                continue;
            }
            let stat = File::stat(local(), &path::join(&self.path, &name))?;
            let kind = if stat.is_directory() {
                'd'
            } else if stat.is_device() {
                'c'
            } else {
                '-'
            };
            println!(
                "{kind} {:04o} {:>10} {name}",
                stat.permissions().bits(),
                stat.size()
            );
        }
        Ok(())
    }
}
