//! On-disk layout of a Pack archive: the file header, the per-item header,
//! and the ordering invariant that makes the item directory binary-searchable.
//!
//! All multi-byte integers are written in host ("native") byte order; a
//! reader rejects any archive whose `is_big_endian` flag does not match the
//! host it is running on; cross-endian reading is not supported.

use std::io::{self, Read, Write};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

use crate::error::PackError;

/// `'P','A','C','K'` read as a single native-endian `u32` word. A reader on
/// a little-endian host and a reader on a big-endian host therefore each
/// see their own magic constant; byte-swapping is never attempted.
pub const MAGIC: u32 = u32::from_ne_bytes(*b"PACK");

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;
pub const VERSION_PATCH: u8 = 0;

/// Largest value a 55-bit `data_offset` can hold.
pub const MAX_DATA_OFFSET: u64 = (1u64 << 55) - 1;

/// Largest path length in bytes. Item paths are opaque byte strings, not
/// required to be valid UTF-8.
pub const MAX_PATH_SIZE: usize = u8::MAX as usize;

/// Largest uncompressed item size supported by the 32-bit size fields.
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64;

/// Fixed-size file header, written once at offset 0.
///
/// Layout (24 bytes, native endian):
/// `magic:u32, version_major:u8, version_minor:u8, version_patch:u8,
/// is_big_endian:u8, prefer_speed:u8, _reserved:[u8;7], item_count:u64`.
///
/// `prefer_speed` is the codec-selector byte: 0 selects the high-ratio
/// codec, 1 the fast codec.
/// The seven `_reserved` bytes keep `item_count` eight-byte aligned and
/// are always written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version_major: u8,
    pub version_minor: u8,
    pub version_patch: u8,
    pub is_big_endian: bool,
    pub prefer_speed: bool,
    pub item_count: u64,
}

impl FileHeader {
    pub const SIZE: u64 = 24;

    pub fn new(item_count: u64, prefer_speed: bool) -> Self {
        FileHeader {
            magic: MAGIC,
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            version_patch: VERSION_PATCH,
            is_big_endian: cfg!(target_endian = "big"),
            prefer_speed,
            item_count,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<NativeEndian>(self.magic)?;
        w.write_u8(self.version_major)?;
        w.write_u8(self.version_minor)?;
        w.write_u8(self.version_patch)?;
        w.write_u8(self.is_big_endian as u8)?;
        w.write_u8(self.prefer_speed as u8)?;
        w.write_all(&[0u8; 7])?;
        w.write_u64::<NativeEndian>(self.item_count)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, PackError> {
        let magic = r.read_u32::<NativeEndian>().map_err(|_| PackError::FailedToReadFile)?;
        if magic != MAGIC {
            return Err(PackError::BadFileType);
        }
        let version_major = r.read_u8().map_err(|_| PackError::FailedToReadFile)?;
        let version_minor = r.read_u8().map_err(|_| PackError::FailedToReadFile)?;
        if version_major != VERSION_MAJOR || version_minor != VERSION_MINOR {
            return Err(PackError::BadFileVersion);
        }
        let version_patch = r.read_u8().map_err(|_| PackError::FailedToReadFile)?;
        let is_big_endian = r.read_u8().map_err(|_| PackError::FailedToReadFile)? != 0;
        if is_big_endian != cfg!(target_endian = "big") {
            return Err(PackError::BadFileEndianness);
        }
        let prefer_speed = r.read_u8().map_err(|_| PackError::FailedToReadFile)? != 0;
        let mut reserved = [0u8; 7];
        r.read_exact(&mut reserved).map_err(|_| PackError::FailedToReadFile)?;
        let item_count = r.read_u64::<NativeEndian>().map_err(|_| PackError::FailedToReadFile)?;
        if item_count == 0 {
            return Err(PackError::BadDataSize);
        }
        Ok(FileHeader {
            magic,
            version_major,
            version_minor,
            version_patch,
            is_big_endian,
            prefer_speed,
            item_count,
        })
    }
}

/// Per-item header, repeated `item_count` times and immediately followed
/// by `path_size` bytes of path and (for non-reference items) the stored
/// payload.
///
/// Layout (17 bytes, native endian): `zip_size:u32, data_size:u32,
/// path_size:u8, packed:u64` where `packed` bit 63 is `is_reference` and
/// bits 0..55 are `data_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHeader {
    pub zip_size: u32,
    pub data_size: u32,
    pub path_size: u8,
    pub is_reference: bool,
    pub data_offset: u64,
}

const IS_REFERENCE_BIT: u64 = 1 << 63;

impl ItemHeader {
    pub const SIZE: u64 = 17;

    /// Size of the payload as stored on disk: 0 for references, else
    /// `zip_size` if compressed else `data_size`.
    pub fn stored_payload_size(&self) -> u64 {
        if self.is_reference {
            0
        } else if self.zip_size > 0 {
            self.zip_size as u64
        } else {
            self.data_size as u64
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        debug_assert!(self.data_offset <= MAX_DATA_OFFSET);
        w.write_u32::<NativeEndian>(self.zip_size)?;
        w.write_u32::<NativeEndian>(self.data_size)?;
        w.write_u8(self.path_size)?;
        let packed = (self.data_offset & MAX_DATA_OFFSET)
            | if self.is_reference { IS_REFERENCE_BIT } else { 0 };
        w.write_u64::<NativeEndian>(packed)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, PackError> {
        let zip_size = r.read_u32::<NativeEndian>().map_err(|_| PackError::FailedToReadFile)?;
        let data_size = r.read_u32::<NativeEndian>().map_err(|_| PackError::FailedToReadFile)?;
        let path_size = r.read_u8().map_err(|_| PackError::FailedToReadFile)?;
        let packed = r.read_u64::<NativeEndian>().map_err(|_| PackError::FailedToReadFile)?;
        let is_reference = packed & IS_REFERENCE_BIT != 0;
        let data_offset = packed & MAX_DATA_OFFSET;
        Ok(ItemHeader {
            zip_size,
            data_size,
            path_size,
            is_reference,
            data_offset,
        })
    }
}

/// Comparator establishing invariant I1: items are ordered by path length
/// first, then lexicographically by path bytes. Branchless on the common
/// case where lengths differ.
pub fn path_key_cmp(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_round_trip() {
        let header = FileHeader::new(7, true);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), FileHeader::SIZE as usize);
        let read_back = FileHeader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(header, read_back);
    }

    #[test]
    fn file_header_rejects_bad_magic() {
        let header = FileHeader::new(1, false);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        buf[0] = b'Q';
        let err = FileHeader::read_from(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, PackError::BadFileType));
    }

    #[test]
    fn file_header_rejects_zero_item_count() {
        let header = FileHeader::new(0, false);
        // Construction of a zero-item header is the writer's job to avoid;
        // the reader must still reject one found on disk.
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let err = FileHeader::read_from(&mut &buf[..]).unwrap_err();
        assert!(matches!(err, PackError::BadDataSize));
    }

    #[test]
    fn item_header_round_trip_reference_and_offset_bits() {
        let header = ItemHeader {
            zip_size: 0,
            data_size: 625,
            path_size: 11,
            is_reference: true,
            data_offset: MAX_DATA_OFFSET,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), ItemHeader::SIZE as usize);
        let read_back = ItemHeader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(header, read_back);
    }

    #[test]
    fn path_key_orders_by_length_then_bytes() {
        let mut paths: Vec<&[u8]> = vec![b"ccc", b"a", b"bb"];
        paths.sort_by(|a, b| path_key_cmp(a, b));
        assert_eq!(paths, vec![b"a".as_slice(), b"bb".as_slice(), b"ccc".as_slice()]);
    }
}
