//! PVF archive entry.

use pvfkit_common::crc;

use crate::header::DirectoryRecord;
use crate::{Error, Result};

/// Where an entry's payload currently lives.
///
/// Reads only ever move an entry from `Unloaded` to `Cached`; writes always
/// produce `Modified`.
#[derive(Debug, Clone)]
pub(crate) enum EntryState {
    /// Only the location of the ciphertext in the source file is known.
    Unloaded { offset: u32 },
    /// Decrypted once and still identical to the ciphertext at `offset`.
    Cached { offset: u32, block: Vec<u8> },
    /// Written in memory; encrypted on the next save.
    Modified { block: Vec<u8> },
}

/// An entry (file) within a PVF archive.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Normalized lookup key.
    key: String,
    /// Name exactly as stored in the directory.
    name: Vec<u8>,
    /// Checksum of `name`, seed of the payload checksum.
    name_checksum: u32,
    /// Logical payload length.
    data_len: u32,
    /// Checksum of the padded plaintext block.
    checksum: u32,
    state: EntryState,
}

/// Round a payload length up to the 4-byte block boundary.
#[inline]
pub fn block_len(data_len: u32) -> u32 {
    data_len.div_ceil(4) * 4
}

impl Entry {
    /// Create an entry holding `data`, named after its key.
    pub fn new(key: impl Into<String>, data: &[u8]) -> Result<Self> {
        let key = key.into();
        let name = key.as_bytes().to_vec();
        let mut entry = Self {
            name_checksum: crc::name_checksum(&name),
            key,
            name,
            data_len: 0,
            checksum: 0,
            state: EntryState::Modified { block: Vec::new() },
        };
        entry.write_data(data)?;
        Ok(entry)
    }

    /// Create a lazily loaded entry from a directory record.
    pub(crate) fn from_record(key: String, record: DirectoryRecord) -> Self {
        Self {
            key,
            name: record.name,
            name_checksum: record.name_checksum,
            data_len: record.data_len,
            checksum: record.checksum,
            state: EntryState::Unloaded {
                offset: record.offset,
            },
        }
    }

    /// Get the normalized key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the name bytes as stored in the directory.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    #[inline]
    pub fn name_checksum(&self) -> u32 {
        self.name_checksum
    }

    /// Get the logical payload length.
    #[inline]
    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Get the padded block length.
    #[inline]
    pub fn block_len(&self) -> u32 {
        block_len(self.data_len)
    }

    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Check if the entry was written since the archive was opened.
    #[inline]
    pub fn is_changed(&self) -> bool {
        matches!(self.state, EntryState::Modified { .. })
    }

    /// Check if the payload is resident in memory.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        !matches!(self.state, EntryState::Unloaded { .. })
    }

    /// Get the payload, or `None` if it has not been loaded yet.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.state {
            EntryState::Unloaded { .. } => None,
            EntryState::Cached { block, .. } | EntryState::Modified { block } => {
                Some(&block[..self.data_len as usize])
            }
        }
    }

    /// Replace the payload.
    ///
    /// The block is zero-padded to a 4-byte boundary and the checksum is
    /// recomputed over the padded block.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let data_len = u32::try_from(data.len())
            .ok()
            .filter(|&len| len <= i32::MAX as u32)
            .ok_or(Error::OffsetOverflow(data.len()))?;

        let mut block = vec![0u8; block_len(data_len) as usize];
        block[..data.len()].copy_from_slice(data);

        self.data_len = data_len;
        self.checksum = crc::derive_checksum(&block, self.name_checksum);
        self.state = EntryState::Modified { block };
        Ok(())
    }

    /// Get metadata for display.
    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            key: self.key.clone(),
            data_len: self.data_len,
            block_len: self.block_len(),
            checksum: self.checksum,
            name_checksum: self.name_checksum,
            changed: self.is_changed(),
        }
    }

    /// Offset of the ciphertext in the source file, while it is still valid.
    pub(crate) fn source_offset(&self) -> Option<u32> {
        match self.state {
            EntryState::Unloaded { offset } | EntryState::Cached { offset, .. } => Some(offset),
            EntryState::Modified { .. } => None,
        }
    }

    /// The plaintext block of a loaded entry.
    pub(crate) fn block(&self) -> Option<&[u8]> {
        match &self.state {
            EntryState::Unloaded { .. } => None,
            EntryState::Cached { block, .. } | EntryState::Modified { block } => Some(block),
        }
    }

    /// Cache a freshly decrypted block. No-op unless the entry is unloaded.
    pub(crate) fn cache(&mut self, block: Vec<u8>) {
        if let EntryState::Unloaded { offset } = self.state {
            self.state = EntryState::Cached { offset, block };
        }
    }
}

/// Entry metadata, detached from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntryInfo {
    pub key: String,
    pub data_len: u32,
    pub block_len: u32,
    pub checksum: u32,
    pub name_checksum: u32,
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_len() {
        assert_eq!(block_len(0), 0);
        assert_eq!(block_len(1), 4);
        assert_eq!(block_len(4), 4);
        assert_eq!(block_len(5), 8);
    }

    #[test]
    fn test_write_data_pads_and_checksums() {
        let entry = Entry::new("test.txt", b"hello").unwrap();

        assert_eq!(entry.data_len(), 5);
        assert_eq!(entry.block_len(), 8);
        assert_eq!(entry.data(), Some(&b"hello"[..]));
        assert_eq!(entry.block().unwrap(), b"hello\0\0\0");
        assert_eq!(entry.name_checksum(), crc::name_checksum(b"test.txt"));
        assert_eq!(
            entry.checksum(),
            crc::derive_checksum(b"hello\0\0\0", entry.name_checksum())
        );
        assert!(entry.is_changed());
    }

    #[test]
    fn test_rewrite_updates_checksum() {
        let mut entry = Entry::new("a", b"one").unwrap();
        let before = entry.checksum();
        entry.write_data(b"two").unwrap();
        assert_ne!(entry.checksum(), before);
        assert_eq!(entry.data(), Some(&b"two"[..]));
    }

    #[test]
    fn test_lazy_state_transitions() {
        let record = DirectoryRecord {
            name_checksum: 1,
            name: b"x".to_vec(),
            data_len: 2,
            checksum: 3,
            offset: 40,
        };
        let mut entry = Entry::from_record("x".into(), record);

        assert!(!entry.is_loaded());
        assert_eq!(entry.data(), None);
        assert_eq!(entry.source_offset(), Some(40));

        entry.cache(vec![7, 8, 0, 0]);
        assert!(entry.is_loaded());
        assert!(!entry.is_changed());
        assert_eq!(entry.data(), Some(&[7u8, 8][..]));
        assert_eq!(entry.source_offset(), Some(40));

        entry.write_data(&[9]).unwrap();
        assert!(entry.is_changed());
        assert_eq!(entry.source_offset(), None);

        // Caching never overwrites written data.
        entry.cache(vec![0; 4]);
        assert_eq!(entry.data(), Some(&[9u8][..]));
    }

    #[test]
    fn test_empty_entry() {
        let entry = Entry::new("empty", &[]).unwrap();
        assert_eq!(entry.block_len(), 0);
        assert_eq!(entry.checksum(), entry.name_checksum());
        assert_eq!(entry.data(), Some(&[][..]));
    }
}
