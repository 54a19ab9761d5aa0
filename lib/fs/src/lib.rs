//! File, directory and application-filesystem access that works the same on
//! the machine itself and on a device attached over a link.
//!
//! Every [`File`] and [`Dir`] is bound to a [`Transport`] when it is
//! constructed. [`File::new`] and [`Dir::new`] use the local system calls;
//! [`File::with_transport`] and [`Dir::with_transport`] route every call
//! through another driver, such as a link to a device or the in-memory
//! [`MemDevice`](transport::MemDevice).
//!
//! ```no_run
//! use sapi_fs::{Dir, File, OpenFlags};
//!
//! # fn main() -> sapi_fs::Result<()> {
//! let mut file = File::new();
//! file.open("/etc/hostname", OpenFlags::READ)?;
//! let mut buf = [0u8; 64];
//! let count = file.read(&mut buf)?;
//! file.close()?;
//!
//! for name in Dir::list(sapi_fs::transport::local(), "/etc")? {
//!     println!("{name}");
//! }
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

pub mod appfs;
pub mod bitmap;
mod dir;
mod error;
mod file;
mod flags;
pub mod path;
mod stat;
pub mod transport;

pub use appfs::{Appfs, AppfsInfo};
pub use bitmap::{Bitmap, BitmapHeader};
pub use dir::Dir;
pub use error::{Error, ErrorKind, Result};
pub use file::File;
pub use flags::{OpenFlags, Permissions};
pub use stat::Stat;
pub use transport::{DirEntry, Ioctl, Transport, TransportCapabilities};
