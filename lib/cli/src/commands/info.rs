use anyhow::{Context, Result};
use clap::Parser;
use sapi_fs::Appfs;
use sapi_fs::transport::local;

#[derive(Debug, Parser)]
/// The options for the `sapi info` subcommand
pub struct Info {
    /// Path of the installed image
    #[clap(name = "PATH")]
    path: String,

    /// Print the header as JSON
    #[clap(long)]
    json: bool,
}

impl Info {
    /// Runs logic for the `info` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to read the header of `{}`", self.path))
    }

    fn inner_execute(&self) -> Result<()> {
        let info = Appfs::get_info(local(), &self.path)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }
        println!("Name: {}", info.name);
        println!("Version: {}", info.version_string());
        println!("Mode: {:o}", info.mode);
        if !info.id.is_empty() {
            println!("Id: {}", info.id);
        }
        println!("RAM size: {}", info.ram_size);
        println!("Signature: {:#010x}", info.signature);
        Ok(())
    }
}
