use anyhow::{Context, Result, bail};
use clap::Parser;
use sapi_fs::transport::local;
use sapi_fs::{Dir, File};

#[derive(Debug, Parser)]
/// The options for the `sapi cp` subcommand
pub struct Cp {
    /// File or directory to copy
    #[clap(name = "SOURCE")]
    source: String,

    /// Where to put the copy
    #[clap(name = "DESTINATION")]
    destination: String,

    /// Copy directories and everything in them
    #[clap(short = 'r', long)]
    recursive: bool,
}

impl Cp {
    /// Runs logic for the `cp` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute().context(format!(
            "failed to copy `{}` to `{}`",
            self.source, self.destination
        ))
    }

    fn inner_execute(&self) -> Result<()> {
        if File::stat(local(), &self.source)?.is_directory() {
            if !self.recursive {
                bail!("`{}` is a directory (use -r to copy it)", self.source);
            }
            Dir::copy(local(), &self.source, local(), &self.destination)?;
        } else {
            let copied = File::copy(local(), &self.source, local(), &self.destination)?;
            tracing::debug!(copied, "copied file");
        }
        Ok(())
    }
}
