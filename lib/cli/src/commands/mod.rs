//! The commands available in the sapi binary.
mod cat;
mod cp;
mod info;
mod install;
mod ls;
mod mkdir;
mod rm;
mod stat;

pub use cat::*;
pub use cp::*;
pub use info::*;
pub use install::*;
pub use ls::*;
pub use mkdir::*;
pub use rm::*;
pub use stat::*;

/// Parses an octal permission string such as `755`.
pub(crate) fn parse_mode(mode: &str) -> Result<sapi_fs::Permissions, String> {
    u32::from_str_radix(mode.trim_start_matches("0o"), 8)
        .map(sapi_fs::Permissions::new)
        .map_err(|err| format!("invalid mode `{mode}`: {err}"))
}
