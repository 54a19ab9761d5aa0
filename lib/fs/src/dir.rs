use tracing::{debug, trace, warn};

use crate::error::{Error, ErrorKind, Result, io_result, not_open, unsupported};
use crate::file::File;
use crate::flags::Permissions;
use crate::path;
use crate::transport::{self, DirEntry, DirStream, Transport, TransportCapabilities, errno};

/// An open directory stream on the local machine or on a linked device.
///
/// Entries come back in the order the transport yields them. Locations used
/// by [`Dir::seek`] and [`Dir::tell`] count entries from the start of the
/// stream, so location `0` is the first entry.
#[derive(Debug)]
pub struct Dir<'d> {
    transport: &'d dyn Transport,
    stream: Option<DirStream>,
    path: String,
    entry: Option<DirEntry>,
    location: usize,
}

#[cfg(all(unix, feature = "host"))]
impl Dir<'static> {
    /// A closed directory bound to the local transport.
    pub fn new() -> Self {
        Self::with_transport(crate::transport::local())
    }
}

#[cfg(all(unix, feature = "host"))]
impl Default for Dir<'static> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_dot(name: &str) -> bool {
    name == "." || name == ".."
}

impl<'d> Dir<'d> {
    pub fn with_transport(transport: &'d dyn Transport) -> Self {
        Self {
            transport,
            stream: None,
            path: String::new(),
            entry: None,
            location: 0,
        }
    }

    pub fn transport(&self) -> &'d dyn Transport {
        self.transport
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The path most recently passed to [`Dir::open`].
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The entry most recently returned by [`Dir::read`].
    pub fn entry(&self) -> Option<&DirEntry> {
        self.entry.as_ref()
    }

    fn stream(&self, context: &'static str) -> Result<DirStream> {
        self.stream.ok_or_else(|| not_open(context))
    }

    /// Open stream of a transport whose cursors can be rewound.
    fn rewindable(&self, context: &'static str) -> Result<DirStream> {
        let stream = self.stream(context)?;
        if !self
            .transport
            .capabilities()
            .contains(TransportCapabilities::REWIND_DIR)
        {
            return Err(unsupported(context));
        }
        Ok(stream)
    }

    /// Opens the directory at `path`, closing any stream held before.
    pub fn open(&mut self, path: &str) -> Result<()> {
        if self.stream.is_some() {
            let _ = self.close();
        }
        let stream = self.transport.opendir(path).map_err(|err| {
            debug!(path, error = %err, "opendir failed");
            Error::with_source(ErrorKind::Open, "dir.open", err).at(path)
        })?;
        trace!(path, transport = self.transport.name(), "opened directory");
        self.stream = Some(stream);
        self.path = path.to_string();
        self.entry = None;
        self.location = 0;
        Ok(())
    }

    /// Name of the next entry, `None` at the end of the stream.
    pub fn read(&mut self) -> Result<Option<&str>> {
        let stream = self.stream("dir.read")?;
        let entry = io_result(ErrorKind::Io, "dir.read", self.transport.readdir(stream))?;
        if entry.is_some() {
            self.location += 1;
        }
        self.entry = entry;
        Ok(self.entry.as_ref().map(|entry| entry.name.as_str()))
    }

    /// Full path (`<dir>/<name>`) of the next entry.
    pub fn get_entry(&mut self) -> Result<Option<String>> {
        if self.read()?.is_none() {
            return Ok(None);
        }
        Ok(self
            .entry
            .as_ref()
            .map(|entry| path::join(&self.path, &entry.name)))
    }

    /// Names of all remaining entries except `.` and `..`.
    pub fn read_list(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(name) = self.read()? {
            if !is_dot(name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Number of entries in the stream. The stream is left where it was.
    pub fn count(&mut self) -> Result<usize> {
        let start = self.tell()?;
        let entry = self.entry.take();
        self.rewind()?;
        let mut total = 0;
        while self.read()?.is_some() {
            total += 1;
        }
        self.seek(start)?;
        self.entry = entry;
        Ok(total)
    }

    pub fn rewind(&mut self) -> Result<()> {
        let stream = self.rewindable("dir.rewind")?;
        io_result(ErrorKind::Io, "dir.rewind", self.transport.rewinddir(stream))?;
        self.location = 0;
        self.entry = None;
        Ok(())
    }

    /// Moves to `location`, or to the end when the stream is shorter.
    pub fn seek(&mut self, location: usize) -> Result<()> {
        self.rewindable("dir.seek")?;
        self.rewind()?;
        while self.location < location {
            if self.read()?.is_none() {
                break;
            }
        }
        Ok(())
    }

    pub fn tell(&self) -> Result<usize> {
        self.rewindable("dir.tell")?;
        Ok(self.location)
    }

    /// Closes the stream. Closing a closed directory does nothing.
    pub fn close(&mut self) -> Result<()> {
        self.entry = None;
        self.location = 0;
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        trace!(path = self.path.as_str(), "closing directory");
        io_result(ErrorKind::Close, "dir.close", self.transport.closedir(stream))
    }

    /// Whether `path` can be opened as a directory.
    pub fn exists(transport: &dyn Transport, path: &str) -> bool {
        let mut dir = Dir::with_transport(transport);
        let exists = dir.open(path).is_ok();
        let _ = dir.close();
        exists
    }

    /// Names in the directory at `path`, without `.` and `..`.
    pub fn list(transport: &dyn Transport, path: &str) -> Result<Vec<String>> {
        let mut dir = Dir::with_transport(transport);
        dir.open(path)?;
        let names = dir.read_list();
        let closed = dir.close();
        let names = names?;
        closed?;
        Ok(names)
    }

    /// Creates the directory `path`.
    ///
    /// With `recursive`, every missing ancestor is created first, in path
    /// order. The error of the first component that cannot be created carries
    /// that component's path.
    pub fn create(
        transport: &dyn Transport,
        path: &str,
        permissions: Permissions,
        recursive: bool,
    ) -> Result<()> {
        if !recursive {
            return mkdir(transport, path, permissions);
        }
        for prefix in path::prefixes(path) {
            if Dir::exists(transport, prefix) {
                continue;
            }
            mkdir(transport, prefix, permissions)?;
        }
        Ok(())
    }

    /// Removes the directory `path`, which has to be empty unless
    /// `recursive` is set.
    ///
    /// Symbolic links inside the tree are unlinked, never followed. A `path`
    /// that is itself a link fails with `ENOTDIR`.
    pub fn remove(transport: &dyn Transport, path: &str, recursive: bool) -> Result<()> {
        if recursive {
            if !File::lstat(transport, path)?.is_directory() {
                return Err(
                    Error::with_source(ErrorKind::Io, "dir.remove", errno(libc::ENOTDIR)).at(path),
                );
            }
            for name in Dir::list(transport, path)? {
                let entry = path::join(path, &name);
                if File::lstat(transport, &entry)?.is_directory() {
                    Dir::remove(transport, &entry, true)?;
                } else {
                    File::remove(transport, &entry)?;
                }
            }
        }
        transport
            .rmdir(path)
            .map_err(|err| Error::with_source(ErrorKind::Io, "dir.remove", err).at(path))?;
        trace!(path, "removed directory");
        Ok(())
    }

    /// Copies the tree under `source` to `destination`.
    ///
    /// Each side has its own transport. Directories are created with the
    /// permission bits of their source; entries that are neither files nor
    /// directories, symbolic links included, are skipped. On a single
    /// transport the destination may not be the source or lie inside it.
    pub fn copy(
        source_transport: &dyn Transport,
        source: &str,
        destination_transport: &dyn Transport,
        destination: &str,
    ) -> Result<()> {
        if transport::same(source_transport, destination_transport)
            && path::is_within(destination, source)
        {
            return Err(Error::new(ErrorKind::InvalidInput, "dir.copy").at(destination));
        }
        let permissions = File::stat(source_transport, source)?.permissions();
        // listed before the destination exists so it never shows up in it
        let names = Dir::list(source_transport, source)?;
        Dir::create(destination_transport, destination, permissions, true)?;
        for name in names {
            let from = path::join(source, &name);
            let to = path::join(destination, &name);
            let stat = File::lstat(source_transport, &from)?;
            if stat.is_directory() {
                Dir::copy(source_transport, &from, destination_transport, &to)?;
            } else if stat.is_file() {
                File::copy(source_transport, &from, destination_transport, &to)?;
            } else {
                debug!(path = from.as_str(), "skipping special file");
            }
        }
        Ok(())
    }
}

fn mkdir(transport: &dyn Transport, path: &str, permissions: Permissions) -> Result<()> {
    transport.mkdir(path, permissions.bits()).map_err(|err| {
        debug!(path, error = %err, "mkdir failed");
        Error::with_source(ErrorKind::Open, "dir.create", err).at(path)
    })?;
    trace!(path, "created directory");
    Ok(())
}

impl Drop for Dir<'_> {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take()
            && let Err(err) = self.transport.closedir(stream)
        {
            warn!(path = self.path.as_str(), error = %err, "failed to close directory on drop");
        }
    }
}
