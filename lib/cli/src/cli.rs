//! The logic for the sapi CLI tool.

use anyhow::Result;
use clap::Parser;

use crate::commands::{Cat, Cp, Info, Install, Ls, Mkdir, Rm, Stat};
use crate::logging;

#[derive(Debug, Parser)]
#[clap(
    name = "sapi",
    about = "Files, directories and application images on the host or a linked device."
)]
/// The options for the sapi Command Line Interface
enum SapiCLIOptions {
    /// List a directory
    #[clap(name = "ls")]
    Ls(Ls),

    /// Create a directory
    #[clap(name = "mkdir")]
    Mkdir(Mkdir),

    /// Remove a file or directory
    #[clap(name = "rm")]
    Rm(Rm),

    /// Copy a file or directory tree
    #[clap(name = "cp")]
    Cp(Cp),

    /// Print a file to stdout
    #[clap(name = "cat")]
    Cat(Cat),

    /// Show the metadata of a path
    #[clap(name = "stat")]
    Stat(Stat),

    /// Install a file into the application filesystem
    #[clap(name = "install")]
    Install(Install),

    /// Show the header of an installed application image
    #[clap(name = "info")]
    Info(Info),
}

impl SapiCLIOptions {
    fn execute(&self) -> Result<()> {
        match self {
            Self::Ls(options) => options.execute(),
            Self::Mkdir(options) => options.execute(),
            Self::Rm(options) => options.execute(),
            Self::Cp(options) => options.execute(),
            Self::Cat(options) => options.execute(),
            Self::Stat(options) => options.execute(),
            Self::Install(options) => options.execute(),
            Self::Info(options) => options.execute(),
        }
    }
}

/// The reserved flags that print the version and exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VersionRequest {
    Short,
    Details,
}

fn version_request(first_arg: Option<&str>) -> Option<VersionRequest> {
    match first_arg {
        Some("-v") | Some("--version") => Some(VersionRequest::Short),
        Some("--version-details") => Some(VersionRequest::Details),
        _ => None,
    }
}

/// The main function for the sapi CLI tool.
pub fn sapi_main() {
    logging::set_up_logging();

    let args = std::env::args().collect::<Vec<_>>();
    let result = match version_request(args.get(1).map(String::as_str)) {
        Some(request) => {
            print_version(request);
            Ok(())
        }
        None => SapiCLIOptions::parse_from(&args).execute(),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

fn print_version(request: VersionRequest) {
    println!("sapi version: {}", crate::VERSION);
    if request == VersionRequest::Details {
        let git_hash = env!("SAPI_GIT_HASH");
        if !git_hash.is_empty() {
            println!("git hash: {git_hash}");
        }
        println!("binary: {}", env!("CARGO_PKG_NAME"));
    }
}
