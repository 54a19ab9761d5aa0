use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sapi_fs::appfs::DEFAULT_MOUNT;
use sapi_fs::transport::local;
use sapi_fs::{Appfs, AppfsInfo};

#[derive(Debug, Parser)]
/// The options for the `sapi install` subcommand
pub struct Install {
    /// File to install
    #[clap(name = "FILE")]
    file: PathBuf,

    /// Mount point of the application filesystem
    #[clap(long, default_value = DEFAULT_MOUNT)]
    mount: String,

    /// Name of the installed file (defaults to the file's own name)
    #[clap(long)]
    name: Option<String>,

    /// Prepend an application header with this `major.minor` version
    #[clap(long = "app-version", value_parser = parse_version)]
    app_version: Option<u16>,

    /// Don't show a progress bar
    #[clap(long)]
    quiet: bool,
}

fn parse_version(version: &str) -> Result<u16, String> {
    AppfsInfo::parse_version(version)
        .ok_or_else(|| format!("invalid version `{version}`, expected `major.minor`"))
}

impl Install {
    /// Runs logic for the `install` subcommand
    pub fn execute(&self) -> Result<()> {
        self.inner_execute()
            .context(format!("failed to install `{}`", self.file.display()))
    }

    fn name(&self) -> Result<String> {
        match &self.name {
            Some(name) => Ok(name.clone()),
            None => self
                .file
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("unable to determine the installed name")),
        }
    }

    fn inner_execute(&self) -> Result<()> {
        let name = self.name()?;
        let contents = std::fs::read(&self.file)?;
        let data = match self.app_version {
            Some(version) => Appfs::image(&AppfsInfo::new(name.as_str(), version), &contents)?,
            None => contents,
        };

        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(data.len() as u64)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {bytes}/{total_bytes}")
                .context("invalid progress template")?,
        );
        let mut progress = |current: usize, _total: usize| {
            bar.set_position(current as u64);
            true
        };

        let written = Appfs::create(local(), &name, &data, &self.mount, Some(&mut progress))?;
        bar.finish_and_clear();
        tracing::info!(name = name.as_str(), written, "installed");
        println!("Installed {written} bytes to {}", sapi_fs::path::join(&self.mount, &name));
        Ok(())
    }
}
