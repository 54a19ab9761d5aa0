//! An in-memory link device.
//!
//! `MemDevice` answers the transport calls the way a device attached over the
//! link does: modes use the link encoding, sizes come from `fstat`, directory
//! cursors cannot be rewound and descriptor numbers are never reused. It backs
//! desktop tooling that runs without hardware and the link-mode tests.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, SeekFrom};

use parking_lot::Mutex;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{DirEntry, DirStream, Fd, Ioctl, Transport, TransportCapabilities, errno};
use crate::error::{Error, ErrorKind, Result};
use crate::flags::OpenFlags;
use crate::stat::Stat;

/// Largest file a link device addresses; offsets on the link are 32 bits.
const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Limits applied by a [`MemDevice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemDeviceConfig {
    /// Descriptors that may be open at once; further opens fail with `EMFILE`.
    pub max_open_files: usize,
    /// Largest transfer a single read or write performs. Larger requests
    /// come back short.
    pub max_transfer: Option<usize>,
    /// Total bytes of file data the device stores; writes past it are cut
    /// short, then fail with `ENOSPC`.
    pub capacity: Option<u64>,
}

impl Default for MemDeviceConfig {
    fn default() -> Self {
        Self {
            max_open_files: 32,
            max_transfer: None,
            capacity: None,
        }
    }
}

impl MemDeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_open_files == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "mem_device.max_open_files must be non-zero",
            ));
        }
        if self.max_transfer == Some(0) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "mem_device.max_transfer must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Call counters of a [`MemDevice`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DeviceStats {
    pub opens: u64,
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub open_files: usize,
}

#[derive(Debug)]
enum Node {
    File { data: Vec<u8>, mode: u32, ino: u64 },
    Dir { mode: u32, ino: u64 },
}

impl Node {
    fn ino(&self) -> u64 {
        match self {
            Node::File { ino, .. } | Node::Dir { ino, .. } => *ino,
        }
    }

    fn stat(&self) -> Stat {
        let stat = match self {
            Node::File { data, mode, .. } => Stat::link(*mode, data.len() as u64),
            Node::Dir { mode, .. } => Stat::link(*mode, 0),
        };
        stat.with_identity(0, self.ino())
    }
}

#[derive(Debug)]
struct OpenFile {
    path: String,
    offset: u64,
    flags: OpenFlags,
}

#[derive(Debug)]
struct DirCursor {
    entries: Vec<DirEntry>,
    pos: usize,
}

#[derive(Debug)]
struct State {
    nodes: BTreeMap<String, Node>,
    files: HashMap<Fd, OpenFile>,
    dirs: HashMap<u64, DirCursor>,
    next_fd: Fd,
    next_dir: u64,
    next_ino: u64,
    used: u64,
    stats: DeviceStats,
}

impl State {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node::Dir {
                mode: Stat::DIRECTORY | 0o777,
                ino: 1,
            },
        );
        Self {
            nodes,
            files: HashMap::new(),
            dirs: HashMap::new(),
            next_fd: 3,
            next_dir: 1,
            next_ino: 2,
            used: 0,
            stats: DeviceStats::default(),
        }
    }

    fn alloc_ino(&mut self) -> u64 {
        let ino = self.next_ino;
        self.next_ino += 1;
        ino
    }

    /// The parent of `path` must exist and be a directory.
    fn check_parent(&self, path: &str) -> io::Result<()> {
        match self.nodes.get(parent(path)) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(errno(libc::ENOTDIR)),
            None => Err(errno(libc::ENOENT)),
        }
    }

    fn children(&self, path: &str) -> Vec<DirEntry> {
        self.nodes
            .iter()
            .filter(|(key, _)| key.as_str() != "/" && parent(key) == path)
            .map(|(key, node)| DirEntry {
                name: key[key.rfind('/').map_or(0, |idx| idx + 1)..].to_string(),
                ino: node.ino(),
            })
            .collect()
    }
}

/// Resolves `.`, `..` and repeated separators of an absolute path.
fn normalize(path: &str) -> io::Result<String> {
    if !path.starts_with('/') {
        return Err(errno(libc::EINVAL));
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    Ok(format!("/{}", parts.join("/")))
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// A device emulated in memory, reachable as a link [`Transport`].
#[derive(Debug)]
pub struct MemDevice {
    config: MemDeviceConfig,
    state: Mutex<State>,
}

impl Default for MemDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MemDevice {
    /// An empty device holding only the root directory.
    pub fn new() -> Self {
        Self {
            config: MemDeviceConfig::default(),
            state: Mutex::new(State::new()),
        }
    }

    pub fn with_config(config: MemDeviceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(State::new()),
        })
    }

    pub fn config(&self) -> &MemDeviceConfig {
        &self.config
    }

    pub fn stats(&self) -> DeviceStats {
        let state = self.state.lock();
        DeviceStats {
            open_files: state.files.len(),
            ..state.stats
        }
    }

    /// Contents of the file at `path`, if there is one.
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize(path).ok()?;
        match self.state.lock().nodes.get(&path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Bytes of file data currently stored.
    pub fn used(&self) -> u64 {
        self.state.lock().used
    }

    fn transfer_len(&self, requested: usize) -> usize {
        match self.config.max_transfer {
            Some(max) => requested.min(max),
            None => requested,
        }
    }
}

impl Transport for MemDevice {
    fn name(&self) -> &'static str {
        "mem"
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities::empty()
    }

    fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> io::Result<Fd> {
        let path = normalize(path)?;
        let flags = if flags.readable() || flags.writable() {
            flags
        } else {
            flags | OpenFlags::READ
        };

        let mut state = self.state.lock();
        if state.files.len() >= self.config.max_open_files {
            return Err(errno(libc::EMFILE));
        }

        let exists = match state.nodes.get(&path) {
            Some(Node::Dir { .. }) => return Err(errno(libc::EISDIR)),
            Some(Node::File { .. }) => true,
            None => false,
        };
        if exists {
            if flags.contains(OpenFlags::CREATE | OpenFlags::EXCL) {
                return Err(errno(libc::EEXIST));
            }
            if flags.contains(OpenFlags::TRUNC) && flags.writable() {
                let State { nodes, used, .. } = &mut *state;
                if let Some(Node::File { data, .. }) = nodes.get_mut(&path) {
                    *used -= data.len() as u64;
                    data.clear();
                }
            }
        } else {
            if !flags.contains(OpenFlags::CREATE) {
                return Err(errno(libc::ENOENT));
            }
            state.check_parent(&path)?;
            let ino = state.alloc_ino();
            state.nodes.insert(
                path.clone(),
                Node::File {
                    data: Vec::new(),
                    mode: Stat::REGULAR | (mode & 0o7777),
                    ino,
                },
            );
        }

        let fd = state.next_fd;
        state.next_fd += 1;
        state.stats.opens += 1;
        trace!(fd, path = path.as_str(), "mem device open");
        state.files.insert(
            fd,
            OpenFile {
                path,
                offset: 0,
                flags,
            },
        );
        Ok(fd)
    }

    fn read(&self, fd: Fd, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let State {
            nodes,
            files,
            stats,
            ..
        } = &mut *state;
        let file = files.get_mut(&fd).ok_or_else(|| errno(libc::EBADF))?;
        if !file.flags.readable() {
            return Err(errno(libc::EBADF));
        }
        let Some(Node::File { data, .. }) = nodes.get(&file.path) else {
            return Err(errno(libc::EBADF));
        };

        let start = (file.offset as usize).min(data.len());
        let count = self.transfer_len(buf.len()).min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        file.offset += count as u64;
        stats.reads += 1;
        stats.bytes_read += count as u64;
        Ok(count)
    }

    fn write(&self, fd: Fd, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let State {
            nodes,
            files,
            used,
            stats,
            ..
        } = &mut *state;
        let file = files.get_mut(&fd).ok_or_else(|| errno(libc::EBADF))?;
        if !file.flags.writable() {
            return Err(errno(libc::EBADF));
        }
        let Some(Node::File { data, .. }) = nodes.get_mut(&file.path) else {
            return Err(errno(libc::EBADF));
        };

        if file.flags.contains(OpenFlags::APPEND) {
            file.offset = data.len() as u64;
        }
        let offset = file.offset;
        let mut count = self.transfer_len(buf.len()) as u64;
        let len = data.len() as u64;
        if offset
            .checked_add(count)
            .is_none_or(|end| end > MAX_FILE_SIZE)
        {
            return Err(errno(libc::EFBIG));
        }
        if let Some(capacity) = self.config.capacity {
            let available = capacity.saturating_sub(*used);
            let end = len + available;
            if offset + count > end {
                if count > 0 && offset >= end {
                    return Err(errno(libc::ENOSPC));
                }
                count = end.saturating_sub(offset);
            }
        }
        stats.writes += 1;
        if count == 0 {
            return Ok(0);
        }

        let end = offset + count;
        if end > len {
            data.resize(end as usize, 0);
            *used += end - len;
        }
        data[offset as usize..end as usize].copy_from_slice(&buf[..count as usize]);
        file.offset = end;
        stats.bytes_written += count;
        Ok(count as usize)
    }

    fn seek(&self, fd: Fd, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.lock();
        let State { nodes, files, .. } = &mut *state;
        let file = files.get_mut(&fd).ok_or_else(|| errno(libc::EBADF))?;
        let len = match nodes.get(&file.path) {
            Some(Node::File { data, .. }) => data.len() as i64,
            _ => return Err(errno(libc::EBADF)),
        };
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).ok(),
            SeekFrom::Current(delta) => (file.offset as i64).checked_add(delta),
            SeekFrom::End(delta) => len.checked_add(delta),
        };
        match target {
            Some(target) if target >= 0 => {
                file.offset = target as u64;
                Ok(file.offset)
            }
            _ => Err(errno(libc::EINVAL)),
        }
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        self.state
            .lock()
            .files
            .remove(&fd)
            .map(drop)
            .ok_or_else(|| errno(libc::EBADF))
    }

    fn fstat(&self, fd: Fd) -> io::Result<Stat> {
        let state = self.state.lock();
        let file = state.files.get(&fd).ok_or_else(|| errno(libc::EBADF))?;
        state
            .nodes
            .get(&file.path)
            .map(Node::stat)
            .ok_or_else(|| errno(libc::EBADF))
    }

    fn stat(&self, path: &str) -> io::Result<Stat> {
        let path = normalize(path)?;
        self.state
            .lock()
            .nodes
            .get(&path)
            .map(Node::stat)
            .ok_or_else(|| errno(libc::ENOENT))
    }

    fn unlink(&self, path: &str) -> io::Result<()> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        match state.nodes.get(&path) {
            Some(Node::File { data, .. }) => {
                let len = data.len() as u64;
                state.nodes.remove(&path);
                state.used -= len;
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(errno(libc::EISDIR)),
            None => Err(errno(libc::ENOENT)),
        }
    }

    fn ioctl(&self, fd: Fd, request: Ioctl<'_>) -> io::Result<i32> {
        let state = self.state.lock();
        let file = state.files.get(&fd).ok_or_else(|| errno(libc::EBADF))?;
        match request {
            Ioctl::BytesAvailable(available) => {
                let Some(Node::File { data, .. }) = state.nodes.get(&file.path) else {
                    return Err(errno(libc::EBADF));
                };
                *available = (data.len() as u64).saturating_sub(file.offset) as usize;
                Ok(0)
            }
            Ioctl::Device { .. } => Err(errno(libc::ENOTTY)),
        }
    }

    fn mkdir(&self, path: &str, mode: u32) -> io::Result<()> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        if state.nodes.contains_key(&path) {
            return Err(errno(libc::EEXIST));
        }
        state.check_parent(&path)?;
        let ino = state.alloc_ino();
        state.nodes.insert(
            path,
            Node::Dir {
                mode: Stat::DIRECTORY | (mode & 0o7777),
                ino,
            },
        );
        Ok(())
    }

    fn rmdir(&self, path: &str) -> io::Result<()> {
        let path = normalize(path)?;
        if path == "/" {
            return Err(errno(libc::EBUSY));
        }
        let mut state = self.state.lock();
        match state.nodes.get(&path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(errno(libc::ENOTDIR)),
            None => return Err(errno(libc::ENOENT)),
        }
        if !state.children(&path).is_empty() {
            return Err(errno(libc::ENOTEMPTY));
        }
        state.nodes.remove(&path);
        Ok(())
    }

    fn opendir(&self, path: &str) -> io::Result<DirStream> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        match state.nodes.get(&path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(errno(libc::ENOTDIR)),
            None => return Err(errno(libc::ENOENT)),
        }
        let entries = state.children(&path);
        let id = state.next_dir;
        state.next_dir += 1;
        state.dirs.insert(id, DirCursor { entries, pos: 0 });
        Ok(DirStream(id))
    }

    fn readdir(&self, dir: DirStream) -> io::Result<Option<DirEntry>> {
        let mut state = self.state.lock();
        let cursor = state
            .dirs
            .get_mut(&dir.0)
            .ok_or_else(|| errno(libc::EBADF))?;
        let entry = cursor.entries.get(cursor.pos).cloned();
        if entry.is_some() {
            cursor.pos += 1;
        }
        Ok(entry)
    }

    fn closedir(&self, dir: DirStream) -> io::Result<()> {
        self.state
            .lock()
            .dirs
            .remove(&dir.0)
            .map(drop)
            .ok_or_else(|| errno(libc::EBADF))
    }

    fn file_size(&self, fd: Fd) -> io::Result<u64> {
        self.fstat(fd).map(|stat| stat.size())
    }
}
