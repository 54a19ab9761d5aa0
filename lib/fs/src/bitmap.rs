//! Packed one-bit-per-pixel bitmaps and their file format.
//!
//! A bitmap file is an 8-byte little-endian header `{width u16, height u16,
//! size u32}` followed by `size` bytes of pixels, one row of
//! `ceil(width / 8)` bytes after another, most significant bit leftmost.

use byteorder::{ByteOrder, LittleEndian};
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::file::File;
use crate::flags::{OpenFlags, Permissions};
use crate::transport::Transport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BitmapHeader {
    pub width: u16,
    pub height: u16,
    pub size: u32,
}

impl BitmapHeader {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        LittleEndian::write_u16(&mut bytes[0..2], self.width);
        LittleEndian::write_u16(&mut bytes[2..4], self.height);
        LittleEndian::write_u32(&mut bytes[4..8], self.size);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            width: LittleEndian::read_u16(&bytes[0..2]),
            height: LittleEndian::read_u16(&bytes[2..4]),
            size: LittleEndian::read_u32(&bytes[4..8]),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u16,
    height: u16,
    data: Vec<u8>,
}

fn columns(width: u16) -> usize {
    usize::from(width).div_ceil(8)
}

/// Reads until `buf` is full or the file ends; returns the bytes read.
fn read_full(file: &File<'_>, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let count = file.read(&mut buf[filled..])?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    Ok(filled)
}

fn read_header(file: &File<'_>, path: &str) -> Result<BitmapHeader> {
    let mut bytes = [0u8; BitmapHeader::SIZE];
    if read_full(file, &mut bytes)? != BitmapHeader::SIZE {
        return Err(Error::new(ErrorKind::InvalidData, "bitmap.header").at(path));
    }
    Ok(BitmapHeader::from_bytes(&bytes))
}

impl Bitmap {
    /// A cleared bitmap.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0; columns(width) * usize::from(height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Bytes per row.
    pub fn columns(&self) -> usize {
        columns(self.width)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn bit(&self, x: u16, y: u16) -> Option<(usize, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = usize::from(y) * self.columns() + usize::from(x / 8);
        Some((index, 0x80 >> (x % 8)))
    }

    /// `false` outside the bitmap.
    pub fn get(&self, x: u16, y: u16) -> bool {
        self.bit(x, y)
            .is_some_and(|(index, mask)| self.data[index] & mask != 0)
    }

    /// Pixels outside the bitmap are ignored.
    pub fn set(&mut self, x: u16, y: u16, on: bool) {
        if let Some((index, mask)) = self.bit(x, y) {
            if on {
                self.data[index] |= mask;
            } else {
                self.data[index] &= !mask;
            }
        }
    }

    pub fn header(&self) -> BitmapHeader {
        BitmapHeader {
            width: self.width,
            height: self.height,
            size: self.data.len() as u32,
        }
    }

    /// Width and height recorded in the file at `path`.
    pub fn load_dim(transport: &dyn Transport, path: &str) -> Result<(u16, u16)> {
        let mut file = File::with_transport(transport);
        file.open(path, OpenFlags::READ)?;
        let header = read_header(&file, path)?;
        file.close()?;
        Ok((header.width, header.height))
    }

    pub fn load(transport: &dyn Transport, path: &str) -> Result<Self> {
        let mut file = File::with_transport(transport);
        file.open(path, OpenFlags::READ)?;
        let header = read_header(&file, path)?;
        let mut bitmap = Bitmap::new(header.width, header.height);
        if header.size as usize != bitmap.data.len() {
            debug!(path, size = header.size, "bitmap size does not match dimensions");
            return Err(Error::new(ErrorKind::InvalidData, "bitmap.load").at(path));
        }
        if read_full(&file, &mut bitmap.data)? != bitmap.data.len() {
            return Err(Error::new(ErrorKind::InvalidData, "bitmap.load").at(path));
        }
        file.close()?;
        Ok(bitmap)
    }

    /// Writes the bitmap to `path`, replacing any existing file. A file that
    /// could not be written completely is removed.
    pub fn save(&self, transport: &dyn Transport, path: &str) -> Result<()> {
        let mut file = File::with_transport(transport);
        file.create(path, true, Permissions::FILE)?;

        match self.write_to(&file, path) {
            Ok(()) => file.close(),
            Err(err) => {
                let _ = file.close();
                if let Err(remove) = File::remove(transport, path) {
                    debug!(path, error = %remove, "failed to remove partial bitmap");
                }
                Err(err)
            }
        }
    }

    fn write_to(&self, file: &File<'_>, path: &str) -> Result<()> {
        let header = self.header().to_bytes();
        if file.write(&header)? != header.len() || file.write(&self.data)? != self.data.len() {
            return Err(Error::new(ErrorKind::Io, "bitmap.save").at(path));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::{MemDevice, MemDeviceConfig};

    fn checkerboard(width: u16, height: u16) -> Bitmap {
        let mut bitmap = Bitmap::new(width, height);
        for y in 0..height {
            for x in 0..width {
                bitmap.set(x, y, (x + y) % 2 == 0);
            }
        }
        bitmap
    }

    #[test]
    fn pixels() {
        let mut bitmap = Bitmap::new(10, 2);
        assert_eq!(bitmap.columns(), 2);
        assert_eq!(bitmap.data().len(), 4);
        bitmap.set(0, 0, true);
        bitmap.set(9, 1, true);
        bitmap.set(10, 0, true);
        assert!(bitmap.get(0, 0));
        assert!(bitmap.get(9, 1));
        assert!(!bitmap.get(10, 0));
        assert_eq!(bitmap.data(), &[0x80, 0x00, 0x00, 0x40]);
        bitmap.set(0, 0, false);
        assert!(!bitmap.get(0, 0));
    }

    #[test]
    fn header_layout() {
        let header = BitmapHeader {
            width: 0x0102,
            height: 3,
            size: 0x0a0b0c0d,
        };
        assert_eq!(header.to_bytes(), [0x02, 0x01, 3, 0, 0x0d, 0x0c, 0x0b, 0x0a]);
        assert_eq!(BitmapHeader::from_bytes(&header.to_bytes()), header);
    }

    #[test]
    fn save_then_load() {
        let device = MemDevice::new();
        for (width, height) in [(1, 1), (8, 3), (13, 7), (64, 2)] {
            let bitmap = checkerboard(width, height);
            bitmap.save(&device, "/bmp").unwrap();
            assert_eq!(Bitmap::load_dim(&device, "/bmp").unwrap(), (width, height));
            assert_eq!(Bitmap::load(&device, "/bmp").unwrap(), bitmap);
        }
    }

    #[test]
    fn load_rejects_inconsistent_size() {
        let device = MemDevice::new();
        let mut file = File::with_transport(&device);
        file.create("/bmp", true, Permissions::FILE).unwrap();
        let header = BitmapHeader {
            width: 8,
            height: 2,
            size: 5,
        };
        file.write(&header.to_bytes()).unwrap();
        file.write(&[0; 5]).unwrap();
        file.close().unwrap();

        let err = Bitmap::load(&device, "/bmp").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert_eq!(device.stats().open_files, 0);
    }

    #[test]
    fn failed_save_removes_partial_file() {
        let device = MemDevice::with_config(MemDeviceConfig {
            capacity: Some(12),
            ..Default::default()
        })
        .unwrap();
        let err = checkerboard(16, 8).save(&device, "/bmp").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(device.contents("/bmp").is_none());
    }
}
