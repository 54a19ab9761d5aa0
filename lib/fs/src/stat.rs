//! File metadata snapshot.

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

use crate::flags::Permissions;

/// Mode and size of a file as reported by a transport.
///
/// A `Stat` produced by the host carries the native `S_IF*` encoding, one
/// produced by a link device carries the link protocol's encoding; the
/// classification helpers pick the matching mask family from `is_local`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Stat {
    mode: u32,
    size: u64,
    is_local: bool,
    dev: u64,
    ino: u64,
}

impl Stat {
    pub const FORMAT: u32 = 0o170000;
    pub const FILE_SOCKET: u32 = 0o140000;
    pub const SYMLINK: u32 = 0o120000;
    pub const REGULAR: u32 = 0o100000;
    pub const BLOCK: u32 = 0o060000;
    pub const DIRECTORY: u32 = 0o040000;
    pub const CHARACTER: u32 = 0o020000;
    pub const FIFO: u32 = 0o010000;

    /// Metadata in the host's native `st_mode` encoding.
    pub const fn native(mode: u32, size: u64) -> Self {
        Self {
            mode,
            size,
            is_local: true,
            dev: 0,
            ino: 0,
        }
    }

    /// Metadata in the link protocol's mode encoding.
    pub const fn link(mode: u32, size: u64) -> Self {
        Self {
            mode,
            size,
            is_local: false,
            dev: 0,
            ino: 0,
        }
    }

    /// Records the device and inode the metadata belongs to.
    pub const fn with_identity(mut self, dev: u64, ino: u64) -> Self {
        self.dev = dev;
        self.ino = ino;
        self
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// True when both snapshots name the same file. Snapshots without an
    /// inode never match.
    pub fn same_file(&self, other: &Stat) -> bool {
        self.ino != 0
            && self.is_local == other.is_local
            && self.dev == other.dev
            && self.ino == other.ino
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::new(self.mode)
    }

    pub fn is_directory(&self) -> bool {
        self.format_is(native::DIRECTORY, Self::DIRECTORY)
    }

    pub fn is_file(&self) -> bool {
        self.format_is(native::REGULAR, Self::REGULAR)
    }

    pub fn is_block_device(&self) -> bool {
        self.format_is(native::BLOCK, Self::BLOCK)
    }

    pub fn is_character_device(&self) -> bool {
        self.format_is(native::CHARACTER, Self::CHARACTER)
    }

    pub fn is_device(&self) -> bool {
        self.is_block_device() || self.is_character_device()
    }

    pub fn is_socket(&self) -> bool {
        self.format_is(native::SOCKET, Self::FILE_SOCKET)
    }

    /// Only an `lstat` reports links; `stat` resolves them.
    pub fn is_symlink(&self) -> bool {
        self.format_is(native::SYMLINK, Self::SYMLINK)
    }

    /// Always `false`: neither mode encoding is interpreted for execute
    /// permission here. Use [`Stat::permissions`] to inspect the raw bits.
    pub fn is_executable(&self) -> bool {
        false
    }

    fn format_is(&self, native: Option<u32>, link: u32) -> bool {
        if self.is_local {
            match native {
                Some(format) => self.mode & native::FORMAT == format,
                None => false,
            }
        } else {
            self.mode & Self::FORMAT == link
        }
    }
}

#[cfg(unix)]
mod native {
    pub const FORMAT: u32 = libc::S_IFMT as u32;
    pub const DIRECTORY: Option<u32> = Some(libc::S_IFDIR as u32);
    pub const REGULAR: Option<u32> = Some(libc::S_IFREG as u32);
    pub const BLOCK: Option<u32> = Some(libc::S_IFBLK as u32);
    pub const CHARACTER: Option<u32> = Some(libc::S_IFCHR as u32);
    pub const SOCKET: Option<u32> = Some(libc::S_IFSOCK as u32);
    pub const SYMLINK: Option<u32> = Some(libc::S_IFLNK as u32);
}

#[cfg(not(unix))]
mod native {
    use super::Stat;

    pub const FORMAT: u32 = Stat::FORMAT;
    pub const DIRECTORY: Option<u32> = Some(Stat::DIRECTORY);
    pub const REGULAR: Option<u32> = Some(Stat::REGULAR);
    pub const BLOCK: Option<u32> = None;
    pub const CHARACTER: Option<u32> = Some(Stat::CHARACTER);
    // no sockets in the native stat of this platform
    pub const SOCKET: Option<u32> = None;
    pub const SYMLINK: Option<u32> = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_classification() {
        let dir = Stat::link(Stat::DIRECTORY | 0o755, 0);
        assert!(dir.is_directory());
        assert!(!dir.is_file());
        assert!(!dir.is_device());

        let file = Stat::link(Stat::REGULAR | 0o644, 12);
        assert!(file.is_file());
        assert_eq!(file.size(), 12);

        let blk = Stat::link(Stat::BLOCK | 0o600, 0);
        assert!(blk.is_block_device());
        assert!(!blk.is_character_device());
        assert!(blk.is_device());

        let chr = Stat::link(Stat::CHARACTER | 0o600, 0);
        assert!(chr.is_character_device());
        assert!(chr.is_device());

        let link = Stat::link(Stat::SYMLINK | 0o777, 0);
        assert!(link.is_symlink());
        assert!(!link.is_file());

        let sock = Stat::link(Stat::FILE_SOCKET, 0);
        assert!(sock.is_socket());
        // socket shares bits with the regular and directory formats
        assert!(!sock.is_file());
        assert!(!sock.is_directory());
        assert!(!sock.is_symlink());
    }

    #[test]
    fn identity() {
        let a = Stat::native(0, 0).with_identity(1, 42);
        assert!(a.same_file(&Stat::native(0o644, 9).with_identity(1, 42)));
        assert!(!a.same_file(&Stat::native(0, 0).with_identity(2, 42)));
        assert!(!a.same_file(&Stat::link(0, 0).with_identity(1, 42)));
        assert!(!Stat::native(0, 0).same_file(&Stat::native(0, 0)));
    }

    #[cfg(unix)]
    #[test]
    fn native_classification() {
        let dir = Stat::native(libc::S_IFDIR as u32 | 0o700, 4096);
        assert!(dir.is_local());
        assert!(dir.is_directory());
        assert!(!dir.is_file());

        let file = Stat::native(libc::S_IFREG as u32 | 0o644, 3);
        assert!(file.is_file());
        assert_eq!(file.permissions().bits(), 0o644);
    }

    #[test]
    fn executable_is_never_reported() {
        let stat = Stat::link(Stat::REGULAR | 0o755, 1);
        assert!(!stat.is_executable());
        assert!(stat.permissions().has_execute());
    }
}
