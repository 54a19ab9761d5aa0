//! The transport seam: every `File`, `Dir` and `Appfs` operation ends up as
//! one call on a [`Transport`].
//!
//! A transport is either the machine the code runs on ([`LocalTransport`],
//! direct system calls) or a driver that forwards each call to an attached
//! device. The driver is chosen once, when a `File` or `Dir` is constructed,
//! and is borrowed for the handle's whole life.

#[cfg(all(unix, feature = "host"))]
mod local;
mod mem;

use std::fmt;
use std::io::{self, SeekFrom};

use bitflags::bitflags;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

use crate::flags::OpenFlags;
use crate::stat::Stat;

#[cfg(all(unix, feature = "host"))]
pub use local::{LocalTransport, local};
pub use mem::{DeviceStats, MemDevice, MemDeviceConfig};

/// A file descriptor. Local and link descriptors share one numbering space.
pub type Fd = i32;

/// Opaque handle to an open directory stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DirStream(pub u64);

/// One directory entry as yielded by [`Transport::readdir`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DirEntry {
    pub name: String,
    pub ino: u64,
}

bitflags! {
    pub struct TransportCapabilities: u32 {
        /// Calls run on the machine itself rather than on an attached device.
        const LOCAL = 1 << 0;
        /// Directory streams can be rewound.
        const REWIND_DIR = 1 << 1;
    }
}

/// Requests accepted by [`Transport::ioctl`].
#[derive(Debug)]
#[non_exhaustive]
pub enum Ioctl<'a> {
    /// Number of bytes that can be read without blocking (`FIONREAD`).
    BytesAvailable(&'a mut usize),
    /// A device-defined request; `arg` is handed to the driver verbatim and
    /// may be written back.
    Device { request: u32, arg: &'a mut [u8] },
}

/// The operations a `File`/`Dir` needs from whatever is underneath.
///
/// Every method reports failure as an [`io::Error`] carrying the driver's
/// errno (`raw_os_error`), so callers see the same codes on both paths.
/// Implementations do their own locking; callers never serialize access.
pub trait Transport: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> TransportCapabilities;

    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> io::Result<Fd>;

    fn read(&self, fd: Fd, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&self, fd: Fd, buf: &[u8]) -> io::Result<usize>;

    fn seek(&self, fd: Fd, pos: SeekFrom) -> io::Result<u64>;

    fn close(&self, fd: Fd) -> io::Result<()>;

    fn fstat(&self, fd: Fd) -> io::Result<Stat>;

    fn stat(&self, path: &str) -> io::Result<Stat>;

    /// Like [`Transport::stat`], but a symbolic link is described itself
    /// rather than resolved. Transports without links keep the default.
    fn lstat(&self, path: &str) -> io::Result<Stat> {
        self.stat(path)
    }

    fn unlink(&self, path: &str) -> io::Result<()>;

    fn ioctl(&self, fd: Fd, request: Ioctl<'_>) -> io::Result<i32>;

    fn mkdir(&self, path: &str, mode: u32) -> io::Result<()>;

    fn rmdir(&self, path: &str) -> io::Result<()>;

    fn opendir(&self, path: &str) -> io::Result<DirStream>;

    /// Next entry of the stream, `None` at end-of-stream.
    fn readdir(&self, dir: DirStream) -> io::Result<Option<DirEntry>>;

    fn rewinddir(&self, _dir: DirStream) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "directory streams of this transport cannot be rewound",
        ))
    }

    fn closedir(&self, dir: DirStream) -> io::Result<()>;

    /// Size of an open file; the descriptor's offset is left unchanged.
    ///
    /// The default measures by seeking to the end and back. Transports with
    /// a cheaper way (a link `fstat`) override it.
    fn file_size(&self, fd: Fd) -> io::Result<u64> {
        let current = self.seek(fd, SeekFrom::Current(0))?;
        let end = self.seek(fd, SeekFrom::End(0))?;
        self.seek(fd, SeekFrom::Start(current))?;
        Ok(end)
    }
}

/// Whether both references point at the same transport instance.
pub(crate) fn same(a: &dyn Transport, b: &dyn Transport) -> bool {
    std::ptr::addr_eq(a, b)
}

pub(crate) fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}
