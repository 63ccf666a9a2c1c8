//! On-disk structures of the PVF container.
//!
//! ```text
//! [guid_len:u32][guid][PvfHeader][encrypted directory][entry blocks...][trailer]
//! ```
//!
//! The decrypted directory is `entry_count` repetitions of
//! `[name_checksum:u32][name_len:u32][name][DirectoryRecordTail]`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use pvfkit_common::BinaryReader;

use crate::Result;

/// Fixed header fields following the GUID.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PvfHeader {
    /// Format version, passed through unchanged.
    pub format_version: i32,
    /// Length of the encrypted directory in bytes (multiple of 4).
    pub directory_len: u32,
    /// Checksum of the plaintext directory; also the directory's cipher key.
    pub directory_checksum: u32,
    /// Number of directory records.
    pub entry_count: i32,
}

impl PvfHeader {
    /// Upper bound accepted for the GUID length prefix.
    pub const MAX_GUID_LEN: usize = 4096;

    /// Smallest possible directory record (empty name).
    pub const MIN_RECORD_LEN: usize = 8 + std::mem::size_of::<DirectoryRecordTail>();
}

/// Fixed fields following an entry's name in the directory.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct DirectoryRecordTail {
    /// Logical payload length.
    pub data_len: i32,
    /// Checksum of the padded plaintext block, seeded by the name checksum.
    pub checksum: u32,
    /// Offset of the encrypted block from the start of the data section.
    pub offset: i32,
}

/// One decoded directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub name_checksum: u32,
    pub name: Vec<u8>,
    pub data_len: u32,
    pub checksum: u32,
    pub offset: u32,
}

impl DirectoryRecord {
    /// Read a record from a decrypted directory.
    pub fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let name_checksum = reader.read_u32()?;
        let name_len = reader.read_u32()? as usize;
        let name = reader.read_bytes(name_len)?.to_vec();
        let tail: DirectoryRecordTail = reader.read_struct()?;

        let (data_len, offset) = (tail.data_len, tail.offset);
        if data_len < 0 || offset < 0 {
            return Err(pvfkit_common::Error::InvalidLength(data_len.min(offset) as i64).into());
        }

        Ok(Self {
            name_checksum,
            name,
            data_len: data_len as u32,
            checksum: tail.checksum,
            offset: offset as u32,
        })
    }

    /// Append the record to a plaintext directory buffer.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name_checksum.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.name);
        let tail = DirectoryRecordTail {
            data_len: self.data_len as i32,
            checksum: self.checksum,
            offset: self.offset as i32,
        };
        out.extend_from_slice(tail.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(std::mem::size_of::<PvfHeader>(), 16);
        assert_eq!(std::mem::size_of::<DirectoryRecordTail>(), 12);
        assert_eq!(PvfHeader::MIN_RECORD_LEN, 20);
    }

    #[test]
    fn test_record_layout() {
        let record = DirectoryRecord {
            name_checksum: 0x0403_0201,
            name: b"a.txt".to_vec(),
            data_len: 5,
            checksum: 0xAABB_CCDD,
            offset: 16,
        };
        let mut out = Vec::new();
        record.write_to(&mut out);

        assert_eq!(out.len(), 8 + 5 + 12);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
        assert_eq!(&out[4..8], &[5, 0, 0, 0]);
        assert_eq!(&out[8..13], b"a.txt");

        let mut reader = BinaryReader::new(&out);
        assert_eq!(DirectoryRecord::read(&mut reader).unwrap(), record);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut out = Vec::new();
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(-1i32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());

        assert!(DirectoryRecord::read(&mut BinaryReader::new(&out)).is_err());
    }
}
