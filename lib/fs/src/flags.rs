//! Open flags and permission bits shared by every transport.

use bitflags::bitflags;

bitflags! {
    /// Access and creation flags for [`crate::File::open`].
    ///
    /// These are transport-neutral; each transport translates them into its
    /// own encoding (`O_*` for the host, the link protocol's flags for a
    /// device).
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_WRITE = Self::READ.bits | Self::WRITE.bits;
        const CREATE = 1 << 2;
        const EXCL = 1 << 3;
        const TRUNC = 1 << 4;
        const APPEND = 1 << 5;
        const NONBLOCK = 1 << 6;
    }
}

impl OpenFlags {
    pub fn readable(&self) -> bool {
        self.contains(OpenFlags::READ)
    }

    pub fn writable(&self) -> bool {
        self.contains(OpenFlags::WRITE)
    }
}

/// POSIX permission bits (`rwxrwxrwx` plus setuid/setgid/sticky).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Permissions(u32);

impl Permissions {
    /// Default for files: `0o666`.
    pub const FILE: Permissions = Permissions(0o666);
    /// Default for directories: `0o777`.
    pub const DIRECTORY: Permissions = Permissions(0o777);

    pub const fn new(mode: u32) -> Self {
        Self(mode & 0o7777)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if any of the three execute bits is set.
    pub const fn has_execute(&self) -> bool {
        self.0 & 0o111 != 0
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::FILE
    }
}
