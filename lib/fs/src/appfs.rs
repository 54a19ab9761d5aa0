//! The application filesystem: flash-backed storage written a page at a time.
//!
//! Files are installed under `<mount>/<name>` by [`Appfs::create`]. Installed
//! application images start with a fixed 64-byte [`AppfsInfo`] header that
//! [`Appfs::get_info`] reads back.

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::dir::Dir;
use crate::error::{Error, ErrorKind, Result, unsupported};
use crate::file::File;
use crate::flags::{OpenFlags, Permissions};
use crate::path;
use crate::transport::{Transport, TransportCapabilities};

/// Largest write the flash page primitive accepts.
pub const PAGE_SIZE: usize = 256;
/// Where the application filesystem is mounted unless told otherwise.
pub const DEFAULT_MOUNT: &str = "/app";
/// Size of the name and id fields of the header, terminator included.
pub const NAME_MAX: usize = 24;
/// Size of an encoded [`AppfsInfo`].
pub const HEADER_SIZE: usize = 64;
/// Signature of images built by [`Appfs::image`].
pub const CREATE_SIGNATURE: u32 = 0x1234_5678;

/// Header at the start of an installed image.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct AppfsInfo {
    pub name: String,
    pub mode: u16,
    /// BCD-style version: major in the high byte, minor in the low byte.
    pub version: u16,
    pub id: String,
    pub ram_size: u32,
    pub o_flags: u32,
    pub signature: u32,
}

impl AppfsInfo {
    /// A read-only data file header for `name` at `version`.
    pub fn new(name: impl Into<String>, version: u16) -> Self {
        Self {
            name: name.into(),
            mode: 0o444,
            version,
            id: String::new(),
            ram_size: 0,
            o_flags: 0,
            signature: CREATE_SIGNATURE,
        }
    }

    /// `major.minor`, each part printed as its BCD digits (`0x0110` is
    /// `1.10`).
    pub fn version_string(&self) -> String {
        format!("{:x}.{:x}", self.version >> 8, self.version & 0xff)
    }

    /// Parses `major.minor` back into the packed form.
    pub fn parse_version(version: &str) -> Option<u16> {
        let (major, minor) = version.split_once('.')?;
        let major = u8::from_str_radix(major, 16).ok()?;
        let minor = u8::from_str_radix(minor, 16).ok()?;
        Some((u16::from(major) << 8) | u16::from(minor))
    }

    pub fn to_bytes(&self) -> Result<[u8; HEADER_SIZE]> {
        let mut header = [0u8; HEADER_SIZE];
        let mut cursor = Cursor::new(&mut header[..]);
        write_fixed(&mut cursor, &self.name)?;
        cursor.write_u16::<LittleEndian>(self.mode).map_err(encode_error)?;
        cursor.write_u16::<LittleEndian>(self.version).map_err(encode_error)?;
        write_fixed(&mut cursor, &self.id)?;
        cursor.write_u32::<LittleEndian>(self.ram_size).map_err(encode_error)?;
        cursor.write_u32::<LittleEndian>(self.o_flags).map_err(encode_error)?;
        cursor.write_u32::<LittleEndian>(self.signature).map_err(encode_error)?;
        Ok(header)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::new(ErrorKind::InvalidData, "appfs.header"));
        }
        let mut cursor = Cursor::new(bytes);
        let name = read_fixed(&mut cursor)?;
        let mode = cursor.read_u16::<LittleEndian>().map_err(decode_error)?;
        let version = cursor.read_u16::<LittleEndian>().map_err(decode_error)?;
        let id = read_fixed(&mut cursor)?;
        Ok(Self {
            name,
            mode,
            version,
            id,
            ram_size: cursor.read_u32::<LittleEndian>().map_err(decode_error)?,
            o_flags: cursor.read_u32::<LittleEndian>().map_err(decode_error)?,
            signature: cursor.read_u32::<LittleEndian>().map_err(decode_error)?,
        })
    }
}

fn encode_error(err: std::io::Error) -> Error {
    Error::with_source(ErrorKind::InvalidInput, "appfs.header", err)
}

fn decode_error(err: std::io::Error) -> Error {
    Error::with_source(ErrorKind::InvalidData, "appfs.header", err)
}

fn write_fixed(cursor: &mut Cursor<&mut [u8]>, value: &str) -> Result<()> {
    if value.len() >= NAME_MAX {
        return Err(Error::new(ErrorKind::InvalidInput, "appfs.header").at(value));
    }
    let mut field = [0u8; NAME_MAX];
    field[..value.len()].copy_from_slice(value.as_bytes());
    cursor.write_all(&field).map_err(encode_error)
}

fn read_fixed(cursor: &mut Cursor<&[u8]>) -> Result<String> {
    let mut field = [0u8; NAME_MAX];
    cursor.read_exact(&mut field).map_err(decode_error)?;
    let len = field.iter().position(|&b| b == 0).unwrap_or(NAME_MAX);
    Ok(String::from_utf8_lossy(&field[..len]).into_owned())
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.len() >= NAME_MAX {
        return Err(Error::new(ErrorKind::InvalidInput, "appfs.create").at(name));
    }
    Ok(())
}

/// Installer for the application filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct Appfs;

impl Appfs {
    pub fn page_size() -> usize {
        PAGE_SIZE
    }

    /// Writes `data` to `<mount>/<name>` one page at a time.
    ///
    /// After each page `progress` gets the bytes written so far and the
    /// total; returning `false` stops the transfer and leaves the file as it
    /// is. Returns the number of bytes written.
    pub fn create(
        transport: &dyn Transport,
        name: &str,
        data: &[u8],
        mount: &str,
        mut progress: Option<&mut dyn FnMut(usize, usize) -> bool>,
    ) -> Result<usize> {
        validate_name(name)?;
        let path = path::join(mount, name);
        let mut file = File::with_transport(transport);
        file.create(&path, true, Permissions::FILE)?;

        let total = data.len();
        let mut written = 0;
        for page in data.chunks(PAGE_SIZE) {
            if file.write(page)? != page.len() {
                return Err(Error::new(ErrorKind::Io, "appfs.write").at(path));
            }
            written += page.len();
            if let Some(progress) = progress.as_deref_mut()
                && !progress(written, total)
            {
                debug!(path = path.as_str(), written, total, "install stopped");
                break;
            }
        }
        file.close()?;
        trace!(path = path.as_str(), written, "installed");
        Ok(written)
    }

    /// Header + payload, ready to be passed to [`Appfs::create`].
    pub fn image(info: &AppfsInfo, payload: &[u8]) -> Result<Vec<u8>> {
        let mut image = Vec::with_capacity(HEADER_SIZE + payload.len());
        image.extend_from_slice(&info.to_bytes()?);
        image.extend_from_slice(payload);
        Ok(image)
    }

    /// Reads the header of the installed file at `path`. The header's name
    /// has to match the file name.
    pub fn get_info(transport: &dyn Transport, path: &str) -> Result<AppfsInfo> {
        let mut file = File::with_transport(transport);
        file.open(path, OpenFlags::READ)?;
        let mut header = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            let count = file.read(&mut header[filled..])?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        file.close()?;

        if filled < HEADER_SIZE {
            return Err(Error::new(ErrorKind::InvalidData, "appfs.get_info").at(path));
        }
        let info = AppfsInfo::from_bytes(&header).map_err(|err| err.at(path))?;
        if info.name != path::name(path).unwrap_or(path) {
            return Err(Error::new(ErrorKind::InvalidData, "appfs.get_info").at(path));
        }
        Ok(info)
    }

    pub fn get_version(transport: &dyn Transport, path: &str) -> Result<u16> {
        Self::get_info(transport, path).map(|info| info.version)
    }

    /// Removes what was installed to RAM under `<mount>/ram`.
    ///
    /// Hidden entries are kept. Executables are kept unless `erase_data` is
    /// set. Only available on the device itself; returns the number of
    /// entries removed.
    pub fn cleanup(transport: &dyn Transport, mount: &str, erase_data: bool) -> Result<usize> {
        if !transport
            .capabilities()
            .contains(TransportCapabilities::LOCAL)
        {
            return Err(unsupported("appfs.cleanup"));
        }
        let ram = path::join(mount, "ram");
        let mut removed = 0;
        for name in Dir::list(transport, &ram)? {
            if name.starts_with('.') {
                continue;
            }
            let entry = path::join(&ram, &name);
            let stat = File::stat(transport, &entry)?;
            if erase_data || !stat.permissions().has_execute() {
                File::remove(transport, &entry)?;
                removed += 1;
            }
        }
        debug!(mount, removed, "cleaned up ram");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::{MemDevice, MemDeviceConfig};

    fn device() -> MemDevice {
        let device = MemDevice::new();
        Dir::create(&device, DEFAULT_MOUNT, Permissions::DIRECTORY, false).unwrap();
        device
    }

    #[test]
    fn writes_in_pages() {
        let device = device();
        let data = vec![0xa5; 3 * Appfs::page_size() + 1];
        let written = Appfs::create(&device, "x", &data, DEFAULT_MOUNT, None).unwrap();
        assert_eq!(written, data.len());
        assert_eq!(device.stats().writes, 4);
        assert_eq!(device.contents("/app/x").unwrap(), data);
    }

    #[test]
    fn progress_can_stop_the_transfer() {
        let device = device();
        let data = vec![1u8; 3 * PAGE_SIZE + 1];
        let calls = RefCell::new(Vec::new());
        let mut progress = |current: usize, total: usize| {
            calls.borrow_mut().push((current, total));
            current < 2 * PAGE_SIZE
        };
        let written =
            Appfs::create(&device, "x", &data, DEFAULT_MOUNT, Some(&mut progress)).unwrap();

        assert_eq!(written, 2 * PAGE_SIZE);
        assert_eq!(device.stats().writes, 2);
        assert_eq!(
            calls.into_inner(),
            vec![(PAGE_SIZE, data.len()), (2 * PAGE_SIZE, data.len())]
        );
        assert_eq!(device.contents("/app/x").unwrap().len(), 2 * PAGE_SIZE);
    }

    #[test]
    fn short_page_write_fails() {
        let device = MemDevice::with_config(MemDeviceConfig {
            max_transfer: Some(100),
            ..Default::default()
        })
        .unwrap();
        Dir::create(&device, DEFAULT_MOUNT, Permissions::DIRECTORY, false).unwrap();
        let err = Appfs::create(&device, "x", &[0u8; 300], DEFAULT_MOUNT, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.path(), Some("/app/x"));
        assert_eq!(device.stats().open_files, 0);
    }

    #[test]
    fn rejects_bad_names() {
        let device = device();
        for name in ["", "a/b", "this-name-is-far-too-long"] {
            let err = Appfs::create(&device, name, b"", DEFAULT_MOUNT, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{name}");
        }
        assert_eq!(device.stats().opens, 0);
    }

    #[test]
    fn info_round_trip() {
        let device = device();
        let mut info = AppfsInfo::new("settings", 0x0102);
        info.id = "com.example.settings".to_string();
        let image = Appfs::image(&info, b"payload").unwrap();
        assert_eq!(image.len(), HEADER_SIZE + 7);

        Appfs::create(&device, "settings", &image, DEFAULT_MOUNT, None).unwrap();
        let read = Appfs::get_info(&device, "/app/settings").unwrap();
        assert_eq!(read, info);
        assert_eq!(read.version_string(), "1.2");
        assert_eq!(Appfs::get_version(&device, "/app/settings").unwrap(), 0x0102);
    }

    #[test]
    fn info_rejects_foreign_files() {
        let device = device();
        Appfs::create(&device, "short", b"tiny", DEFAULT_MOUNT, None).unwrap();
        let err = Appfs::get_info(&device, "/app/short").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);

        let image = Appfs::image(&AppfsInfo::new("other", 1), b"").unwrap();
        Appfs::create(&device, "renamed", &image, DEFAULT_MOUNT, None).unwrap();
        let err = Appfs::get_info(&device, "/app/renamed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn versions() {
        assert_eq!(AppfsInfo::new("a", 0x0110).version_string(), "1.10");
        assert_eq!(AppfsInfo::parse_version("1.10"), Some(0x0110));
        assert_eq!(AppfsInfo::parse_version("2.0"), Some(0x0200));
        assert_eq!(AppfsInfo::parse_version("2"), None);
        assert_eq!(AppfsInfo::parse_version("x.1"), None);
    }

    #[test]
    fn cleanup_is_device_local() {
        let device = device();
        let err = Appfs::cleanup(&device, DEFAULT_MOUNT, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotSupported);
    }
}
