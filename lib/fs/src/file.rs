use std::io::{self, SeekFrom};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{Error, ErrorKind, Result, io_result, not_open};
use crate::flags::{OpenFlags, Permissions};
use crate::path;
use crate::stat::Stat;
use crate::transport::{self, Fd, Ioctl, Transport};

/// Bytes requested per read by [`File::gets`].
const GETS_CHUNK: usize = 128;
/// Bytes moved per read/write pair by [`File::copy`].
const COPY_CHUNK: usize = 1024;
/// Sleep between empty reads of [`File::readline`].
const READLINE_POLL: Duration = Duration::from_millis(1);

/// An open file on the local machine or on a linked device.
///
/// The transport is fixed when the `File` is constructed; every operation of
/// the instance goes through it. A `File` owns at most one descriptor, which
/// is released by [`File::close`] or when the `File` is dropped.
#[derive(Debug)]
pub struct File<'d> {
    transport: &'d dyn Transport,
    fd: Option<Fd>,
}

#[cfg(all(unix, feature = "host"))]
impl File<'static> {
    /// A closed file bound to the local transport.
    pub fn new() -> Self {
        Self::with_transport(crate::transport::local())
    }
}

#[cfg(all(unix, feature = "host"))]
impl Default for File<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> File<'d> {
    /// A closed file whose operations go through `transport`.
    pub fn with_transport(transport: &'d dyn Transport) -> Self {
        Self {
            transport,
            fd: None,
        }
    }

    pub fn transport(&self) -> &'d dyn Transport {
        self.transport
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    pub fn fileno(&self) -> Option<Fd> {
        self.fd
    }

    fn fd(&self, context: &'static str) -> Result<Fd> {
        self.fd.ok_or_else(|| not_open(context))
    }

    /// Opens `path` with the default file permissions.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<()> {
        self.open_with(path, flags, Permissions::FILE)
    }

    /// Opens `path`, closing the descriptor this file held before.
    ///
    /// `permissions` only matter when `flags` lets the open create the file.
    pub fn open_with(
        &mut self,
        path: &str,
        flags: OpenFlags,
        permissions: Permissions,
    ) -> Result<()> {
        if self.fd.is_some() {
            // The old descriptor goes away whatever the close reports.
            let _ = self.close();
        }
        let fd = self
            .transport
            .open(path, flags, permissions.bits())
            .map_err(|err| {
                debug!(path, error = %err, "open failed");
                Error::with_source(ErrorKind::Open, "file.open", err).at(path)
            })?;
        trace!(fd, path, transport = self.transport.name(), "opened file");
        self.fd = Some(fd);
        Ok(())
    }

    /// Opens `path` for reading and writing, creating it when missing.
    /// `overwrite` truncates an existing file.
    pub fn create(&mut self, path: &str, overwrite: bool, permissions: Permissions) -> Result<()> {
        let mut flags = OpenFlags::READ_WRITE | OpenFlags::CREATE;
        if overwrite {
            flags |= OpenFlags::TRUNC;
        }
        self.open_with(path, flags, permissions)
    }

    /// Reads at the current offset. A short count is returned as is.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let fd = self.fd("file.read")?;
        io_result(ErrorKind::Io, "file.read", self.transport.read(fd, buf))
    }

    /// Writes at the current offset. A short count is returned as is.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let fd = self.fd("file.write")?;
        io_result(ErrorKind::Io, "file.write", self.transport.write(fd, buf))
    }

    /// Seeks to `offset`, then reads. Nothing is read if the seek fails.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.read(buf)
    }

    /// Seeks to `offset`, then writes. Nothing is written if the seek fails.
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.write(buf)
    }

    pub fn seek(&self, pos: SeekFrom) -> Result<u64> {
        let fd = self.fd("file.seek")?;
        io_result(ErrorKind::Seek, "file.seek", self.transport.seek(fd, pos))
    }

    /// The current offset.
    pub fn loc(&self) -> Result<u64> {
        self.seek(SeekFrom::Current(0))
    }

    /// Size of the open file. The offset is the same afterwards.
    pub fn size(&self) -> Result<u64> {
        let fd = self.fd("file.size")?;
        io_result(ErrorKind::Io, "file.size", self.transport.file_size(fd))
    }

    pub fn ioctl(&self, request: Ioctl<'_>) -> Result<i32> {
        let fd = self.fd("file.ioctl")?;
        io_result(ErrorKind::Io, "file.ioctl", self.transport.ioctl(fd, request))
    }

    /// Reads one byte at a time into `buf` until `term` has been stored,
    /// `buf` is full, or reads have come back empty for `timeout`.
    ///
    /// An empty read, `EAGAIN` or `EINTR` counts as one poll: the call sleeps
    /// for a millisecond and adds it to the time waited. Returns the number of
    /// bytes stored, zero if the wait ran out before anything arrived.
    pub fn readline(&self, buf: &mut [u8], timeout: Duration, term: u8) -> Result<usize> {
        let fd = self.fd("file.readline")?;
        let mut received = 0;
        let mut waited = Duration::ZERO;
        while received < buf.len() {
            let mut byte = [0u8; 1];
            let arrived = match self.transport.read(fd, &mut byte) {
                Ok(count) => count == 1,
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    false
                }
                Err(err) => {
                    return Err(Error::with_source(ErrorKind::Io, "file.readline", err));
                }
            };
            if arrived {
                buf[received] = byte[0];
                received += 1;
                if byte[0] == term {
                    break;
                }
                continue;
            }
            thread::sleep(READLINE_POLL);
            waited += READLINE_POLL;
            if waited >= timeout {
                break;
            }
        }
        Ok(received)
    }

    /// Reads a line of at most `max` bytes ending with `term`.
    ///
    /// Reads go out in chunks of up to 128 bytes; bytes read past the
    /// terminator are given back with a relative seek so the next read starts
    /// right after it. The terminator is part of the returned line. Returns
    /// `None` when nothing could be read.
    pub fn gets(&self, max: usize, term: u8) -> Result<Option<Vec<u8>>> {
        let fd = self.fd("file.gets")?;
        let mut line = Vec::with_capacity(max.min(GETS_CHUNK));
        let mut chunk = [0u8; GETS_CHUNK];
        while line.len() < max {
            let want = GETS_CHUNK.min(max - line.len());
            let count = io_result(
                ErrorKind::Io,
                "file.gets",
                self.transport.read(fd, &mut chunk[..want]),
            )?;
            if count == 0 {
                break;
            }
            match chunk[..count].iter().position(|&byte| byte == term) {
                Some(idx) => {
                    line.extend_from_slice(&chunk[..=idx]);
                    let over_read = count - idx - 1;
                    if over_read > 0 {
                        self.seek(SeekFrom::Current(-(over_read as i64)))?;
                    }
                    break;
                }
                None => line.extend_from_slice(&chunk[..count]),
            }
        }
        Ok((!line.is_empty()).then_some(line))
    }

    /// Closes the descriptor. Closing a closed file does nothing.
    ///
    /// The file counts as closed even when the transport reports an error.
    pub fn close(&mut self) -> Result<()> {
        let Some(fd) = self.fd.take() else {
            return Ok(());
        };
        trace!(fd, transport = self.transport.name(), "closing file");
        io_result(ErrorKind::Close, "file.close", self.transport.close(fd))
    }

    pub fn stat(transport: &dyn Transport, path: &str) -> Result<Stat> {
        transport
            .stat(path)
            .map_err(|err| Error::with_source(ErrorKind::Open, "file.stat", err).at(path))
    }

    /// Metadata of `path` itself; a symbolic link is not followed.
    pub fn lstat(transport: &dyn Transport, path: &str) -> Result<Stat> {
        transport
            .lstat(path)
            .map_err(|err| Error::with_source(ErrorKind::Open, "file.lstat", err).at(path))
    }

    pub fn size_of(transport: &dyn Transport, path: &str) -> Result<u64> {
        Self::stat(transport, path).map(|stat| stat.size())
    }

    pub fn remove(transport: &dyn Transport, path: &str) -> Result<()> {
        transport
            .unlink(path)
            .map_err(|err| Error::with_source(ErrorKind::Io, "file.remove", err).at(path))
    }

    /// Copies the bytes of `source` into `destination`, which is created or
    /// truncated with the source's permission bits. The two sides may use
    /// different transports. Returns the number of bytes copied.
    ///
    /// Copying a file onto itself is refused with `InvalidInput` before
    /// anything is opened.
    pub fn copy(
        source_transport: &dyn Transport,
        source: &str,
        destination_transport: &dyn Transport,
        destination: &str,
    ) -> Result<u64> {
        let source_stat = Self::stat(source_transport, source)?;
        if transport::same(source_transport, destination_transport) {
            let same_file = path::normalize(source) == path::normalize(destination)
                || destination_transport
                    .stat(destination)
                    .is_ok_and(|stat| stat.same_file(&source_stat));
            if same_file {
                return Err(Error::new(ErrorKind::InvalidInput, "file.copy").at(destination));
            }
        }
        let permissions = source_stat.permissions();
        let mut input = File::with_transport(source_transport);
        input.open(source, OpenFlags::READ)?;
        let mut output = File::with_transport(destination_transport);
        output.create(destination, true, permissions)?;

        let mut buf = [0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            let count = input.read(&mut buf)?;
            if count == 0 {
                break;
            }
            if output.write(&buf[..count])? != count {
                return Err(Error::new(ErrorKind::Io, "file.copy").at(destination));
            }
            copied += count as u64;
        }
        input.close()?;
        output.close()?;
        trace!(source, destination, copied, "copied file");
        Ok(copied)
    }

    /// See [`path::name`].
    pub fn name(path: &str) -> Option<&str> {
        path::name(path)
    }

    /// See [`path::suffix`].
    pub fn suffix(path: &str) -> Option<&str> {
        path::suffix(path)
    }
}

impl Drop for File<'_> {
    fn drop(&mut self) {
        if let Some(fd) = self.fd.take()
            && let Err(err) = self.transport.close(fd)
        {
            warn!(fd, error = %err, "failed to close file on drop");
        }
    }
}
