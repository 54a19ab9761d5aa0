//! Direct system-call transport for the host.

use std::ffi::{CStr, CString};
use std::io::{self, SeekFrom};
use std::mem;
use std::ptr::NonNull;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use slab::Slab;

use super::{DirEntry, DirStream, Fd, Ioctl, Transport, TransportCapabilities, errno};
use crate::flags::OpenFlags;
use crate::stat::Stat;

static LOCAL: Lazy<LocalTransport> = Lazy::new(LocalTransport::new);

/// The process-wide local transport used by `File::new` and `Dir::new`.
pub fn local() -> &'static LocalTransport {
    &LOCAL
}

#[derive(Debug)]
struct LocalDir {
    dirp: NonNull<libc::DIR>,
}

// SAFETY: a `DIR*` is only touched while the stream table lock is held.
unsafe impl Send for LocalDir {}

/// Forwards every operation to the host's POSIX system calls.
///
/// Directory streams live in a table owned by the transport so that a
/// [`DirStream`] handle never aliases a raw pointer.
#[derive(Debug, Default)]
pub struct LocalTransport {
    dirs: Mutex<Slab<LocalDir>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cstring(path: &str) -> io::Result<CString> {
    CString::new(path).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))
}

fn cvt(res: libc::c_int) -> io::Result<libc::c_int> {
    if res < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(res)
    }
}

fn open_flags_to_libc(flags: OpenFlags) -> libc::c_int {
    let mut oflags = libc::O_CLOEXEC;
    oflags |= match (flags.readable(), flags.writable()) {
        (true, true) => libc::O_RDWR,
        (false, true) => libc::O_WRONLY,
        _ => libc::O_RDONLY,
    };
    if flags.contains(OpenFlags::CREATE) {
        oflags |= libc::O_CREAT;
    }
    if flags.contains(OpenFlags::EXCL) {
        oflags |= libc::O_EXCL;
    }
    if flags.contains(OpenFlags::TRUNC) {
        oflags |= libc::O_TRUNC;
    }
    if flags.contains(OpenFlags::APPEND) {
        oflags |= libc::O_APPEND;
    }
    if flags.contains(OpenFlags::NONBLOCK) {
        oflags |= libc::O_NONBLOCK;
    }
    oflags
}

fn stat_from_libc(st: &libc::stat) -> Stat {
    Stat::native(st.st_mode as u32, st.st_size as u64)
        .with_identity(st.st_dev as u64, st.st_ino as u64)
}

impl Transport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities::LOCAL | TransportCapabilities::REWIND_DIR
    }

    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> io::Result<Fd> {
        let cstr = cstring(path)?;
        let oflags = open_flags_to_libc(flags);
        cvt(unsafe { libc::open(cstr.as_ptr(), oflags, mode as libc::c_uint) })
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> io::Result<usize> {
        let res = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(res as usize)
    }

    fn write(&self, fd: Fd, buf: &[u8]) -> io::Result<usize> {
        let res = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(res as usize)
    }

    fn seek(&self, fd: Fd, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(offset) => (
                libc::off_t::try_from(offset).map_err(|_| errno(libc::EINVAL))?,
                libc::SEEK_SET,
            ),
            SeekFrom::Current(offset) => (offset as libc::off_t, libc::SEEK_CUR),
            SeekFrom::End(offset) => (offset as libc::off_t, libc::SEEK_END),
        };
        let res = unsafe { libc::lseek(fd, offset, whence) };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(res as u64)
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        cvt(unsafe { libc::close(fd) }).map(drop)
    }

    fn fstat(&self, fd: Fd) -> io::Result<Stat> {
        let mut st = unsafe { mem::zeroed::<libc::stat>() };
        cvt(unsafe { libc::fstat(fd, &mut st) })?;
        Ok(stat_from_libc(&st))
    }

    fn stat(&self, path: &str) -> io::Result<Stat> {
        let cstr = cstring(path)?;
        let mut st = unsafe { mem::zeroed::<libc::stat>() };
        cvt(unsafe { libc::stat(cstr.as_ptr(), &mut st) })?;
        Ok(stat_from_libc(&st))
    }

    fn lstat(&self, path: &str) -> io::Result<Stat> {
        let cstr = cstring(path)?;
        let mut st = unsafe { mem::zeroed::<libc::stat>() };
        cvt(unsafe { libc::lstat(cstr.as_ptr(), &mut st) })?;
        Ok(stat_from_libc(&st))
    }

    fn unlink(&self, path: &str) -> io::Result<()> {
        let cstr = cstring(path)?;
        cvt(unsafe { libc::unlink(cstr.as_ptr()) }).map(drop)
    }

    fn ioctl(&self, fd: Fd, request: Ioctl<'_>) -> io::Result<i32> {
        match request {
            Ioctl::BytesAvailable(available) => {
                let mut count: libc::c_int = 0;
                let res = cvt(unsafe { libc::ioctl(fd, libc::FIONREAD, &mut count as *mut libc::c_int) })?;
                *available = count.max(0) as usize;
                Ok(res)
            }
            // Argument layouts of device requests are defined by the device
            // driver; the host has no such driver behind a plain descriptor.
            Ioctl::Device { .. } => Err(errno(libc::ENOTTY)),
        }
    }

    fn mkdir(&self, path: &str, mode: u32) -> io::Result<()> {
        let cstr = cstring(path)?;
        cvt(unsafe { libc::mkdir(cstr.as_ptr(), mode as libc::mode_t) }).map(drop)
    }

    fn rmdir(&self, path: &str) -> io::Result<()> {
        let cstr = cstring(path)?;
        cvt(unsafe { libc::rmdir(cstr.as_ptr()) }).map(drop)
    }

    fn opendir(&self, path: &str) -> io::Result<DirStream> {
        let cstr = cstring(path)?;
        let dirp = unsafe { libc::opendir(cstr.as_ptr()) };
        let Some(dirp) = NonNull::new(dirp) else {
            return Err(io::Error::last_os_error());
        };
        let key = self.dirs.lock().insert(LocalDir { dirp });
        Ok(DirStream(key as u64))
    }

    fn readdir(&self, dir: DirStream) -> io::Result<Option<DirEntry>> {
        let dirs = self.dirs.lock();
        let stream = dirs.get(dir.0 as usize).ok_or_else(|| errno(libc::EBADF))?;
        // readdir only fails with EBADF, which the table lookup rules out, so
        // a null entry is end-of-stream.
        let entry = unsafe { libc::readdir(stream.dirp.as_ptr()) };
        if entry.is_null() {
            return Ok(None);
        }
        let (name, ino) = unsafe {
            let entry = &*entry;
            (
                CStr::from_ptr(entry.d_name.as_ptr())
                    .to_string_lossy()
                    .into_owned(),
                entry.d_ino as u64,
            )
        };
        Ok(Some(DirEntry { name, ino }))
    }

    fn rewinddir(&self, dir: DirStream) -> io::Result<()> {
        let dirs = self.dirs.lock();
        let stream = dirs.get(dir.0 as usize).ok_or_else(|| errno(libc::EBADF))?;
        unsafe { libc::rewinddir(stream.dirp.as_ptr()) };
        Ok(())
    }

    fn closedir(&self, dir: DirStream) -> io::Result<()> {
        let stream = self
            .dirs
            .lock()
            .try_remove(dir.0 as usize)
            .ok_or_else(|| errno(libc::EBADF))?;
        cvt(unsafe { libc::closedir(stream.dirp.as_ptr()) }).map(drop)
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        for stream in self.dirs.get_mut().drain() {
            unsafe { libc::closedir(stream.dirp.as_ptr()) };
        }
    }
}
