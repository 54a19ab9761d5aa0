use std::io;
use thiserror::Error;

/// Broad category of a failed operation.
///
/// The category names the step that failed, not the cause: the cause (the
/// errno reported by the system call or by the link driver) travels as the
/// error's source.
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Opening or creating a file or directory failed
    #[error("open failed")]
    Open,
    /// A read or write failed or transferred fewer bytes than required
    #[error("io error")]
    Io,
    /// Repositioning a descriptor failed
    #[error("seek failed")]
    Seek,
    /// The underlying close reported an error; the handle is closed anyway
    #[error("close failed")]
    Close,
    /// The operation has no meaning for the active transport
    #[error("operation not supported")]
    NotSupported,
    /// The handle is not open
    #[error("handle is not open")]
    NotOpen,
    /// An argument was rejected before reaching the transport
    #[error("invalid input")]
    InvalidInput,
    /// Data read back from a file has an unexpected layout
    #[error("invalid data")]
    InvalidData,
}

/// Error returned by every fallible operation of this crate.
#[derive(Error, Debug)]
#[error("{context}: {kind}{}", at_path(.path))]
pub struct Error {
    kind: ErrorKind,
    context: &'static str,
    path: Option<String>,
    #[source]
    source: Option<io::Error>,
}

fn at_path(path: &Option<String>) -> String {
    path.as_deref()
        .map(|path| format!(" ({path})"))
        .unwrap_or_default()
}

impl Error {
    pub fn new(kind: ErrorKind, context: &'static str) -> Self {
        Self {
            kind,
            context,
            path: None,
            source: None,
        }
    }

    pub fn with_source(kind: ErrorKind, context: &'static str, source: io::Error) -> Self {
        Self {
            kind,
            context,
            path: None,
            source: Some(source),
        }
    }

    /// Attach the path the failing operation was working on.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The underlying I/O error, if the failure came from a transport call.
    pub fn io_error(&self) -> Option<&io::Error> {
        self.source.as_ref()
    }

    /// The raw errno reported by the system or the link driver.
    pub fn errno(&self) -> Option<i32> {
        self.source.as_ref().and_then(io::Error::raw_os_error)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn io_result<T>(
    kind: ErrorKind,
    context: &'static str,
    result: io::Result<T>,
) -> Result<T> {
    result.map_err(|err| Error::with_source(kind, context, err))
}

pub(crate) fn not_open(context: &'static str) -> Error {
    Error::new(ErrorKind::NotOpen, context)
}

pub(crate) fn unsupported(context: &'static str) -> Error {
    Error::new(ErrorKind::NotSupported, context)
}
