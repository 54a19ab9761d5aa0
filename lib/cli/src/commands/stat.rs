use anyhow::{Context, Result};
use clap::Parser;
use sapi_fs::File;
use sapi_fs::transport::local;
use serde::Serialize;

#[derive(Debug, Parser)]
/// The options for the `sapi stat` subcommand
pub struct Stat {
    /// Path to inspect
    #[clap(name = "PATH")]
    path: String,

    /// Print the metadata as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Serialize)]
struct StatOutput<'a> {
    path: &'a str,
    kind: &'static str,
    permissions: String,
    #[serde(flatten)]
    stat: sapi_fs::Stat,
}

fn kind(stat: &sapi_fs::Stat) -> &'static str {
    if stat.is_directory() {
        "directory"
    } else if stat.is_file() {
        "file"
    } else if stat.is_block_device() {
        "block device"
    } else if stat.is_character_device() {
        "character device"
    } else if stat.is_socket() {
        "socket"
    } else {
        "other"
    }
}

impl Stat {
    /// Runs logic for the `stat` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to stat `{}`", self.path))
    }

    fn inner_execute(&self) -> Result<()> {
        let stat = File::stat(local(), &self.path)?;
        let output = StatOutput {
            path: &self.path,
            kind: kind(&stat),
            permissions: format!("{:04o}", stat.permissions().bits()),
            stat,
        };
        if self.json {
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Path: {}", output.path);
            println!("Type: {}", output.kind);
            println!("Size: {}", stat.size());
            println!("Permissions: {}", output.permissions);
        }
        Ok(())
    }
}
