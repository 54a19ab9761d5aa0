use anyhow::{Context, Result};
use clap::Parser;
use sapi_fs::transport::local;
use sapi_fs::{Dir, Permissions};

use super::parse_mode;

#[derive(Debug, Parser)]
/// The options for the `sapi mkdir` subcommand
pub struct Mkdir {
    /// Directory to create
    #[clap(name = "PATH")]
    path: String,

    /// Create missing parent directories as well
    #[clap(short = 'p', long)]
    parents: bool,

    /// Permission bits of the new directories, in octal
    #[clap(long, default_value = "777", value_parser = parse_mode)]
    mode: Permissions,
}

impl Mkdir {
    /// Runs logic for the `mkdir` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to create `{}`", self.path))
    }

    fn inner_execute(&self) -> Result<()> {
        Dir::create(local(), &self.path, self.mode, self.parents)?;
        Ok(())
    }
}
