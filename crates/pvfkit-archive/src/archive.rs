//! PVF archive reader and writer.
//!
//! Opening parses only the directory; payloads stay in the memory-mapped
//! source and are decrypted on first access. Saving rebuilds the directory,
//! encrypts modified entries and copies the ciphertext of everything else
//! straight from the source file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use memmap2::Mmap;
use pvfkit_common::{crc, BinaryReader, IntoBytes};

use crate::crypto;
use crate::entry::{Entry, EntryInfo};
use crate::header::{DirectoryRecord, PvfHeader};
use crate::{Error, Result};

/// Bytes appended after the last entry block. Ignored when reading.
pub const TRAILER: &[u8] = b"pvfkit";

/// Format version written by [`PvfArchive::new`] unless told otherwise.
pub const DEFAULT_FORMAT_VERSION: i32 = 1;

/// Normalize an entry name into a lookup key.
///
/// Keys are lowercase, use `/` separators and carry no leading slash.
pub fn normalize_key(name: &str) -> String {
    name.trim()
        .replace('\\', "/")
        .trim_start_matches('/')
        .to_lowercase()
}

/// Relative filesystem path for a key.
///
/// Returns `None` for empty keys and keys with components other than plain
/// names (`..`, `.`, roots or drive prefixes), which could resolve outside
/// the directory the path is joined onto.
pub fn key_path(key: &str) -> Option<PathBuf> {
    let path = Path::new(key);
    let mut components = path.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| path.to_path_buf())
}

/// Calls the progress callback whenever the whole percentage changes.
struct Steps<F> {
    report: F,
    total: usize,
    last: Option<usize>,
}

impl<F: FnMut(usize, usize)> Steps<F> {
    fn new(report: F, total: usize) -> Self {
        Self {
            report,
            total,
            last: None,
        }
    }

    fn tick(&mut self, done: usize) {
        let percent = if self.total == 0 {
            100
        } else {
            done * 100 / self.total
        };
        if self.last != Some(percent) {
            self.last = Some(percent);
            (self.report)(done, self.total);
        }
    }
}

/// An open PVF archive.
pub struct PvfArchive {
    /// File the archive was opened from.
    path: Option<PathBuf>,
    /// Memory-mapped source file.
    source: Option<Mmap>,
    /// Offset of the first entry block in `source`.
    data_start: usize,
    guid: Vec<u8>,
    format_version: i32,
    entries: BTreeMap<String, Entry>,
}

impl PvfArchive {
    /// Create an empty archive that lives only in memory until saved.
    pub fn new(guid: Vec<u8>, format_version: i32) -> Self {
        Self {
            path: None,
            source: None,
            data_start: 0,
            guid,
            format_version,
            entries: BTreeMap::new(),
        }
    }

    /// Open an archive.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_progress(path, |_, _| {})
    }

    /// Open an archive, reporting `(done, total)` directory records parsed.
    pub fn open_with_progress<P: AsRef<Path>>(
        path: P,
        progress: impl FnMut(usize, usize),
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let mut reader = BinaryReader::new(&mmap);
        let guid_len = reader.read_u32()? as usize;
        if guid_len > PvfHeader::MAX_GUID_LEN {
            return Err(Error::InvalidHeader(format!("GUID length {guid_len} too large")));
        }
        let guid = reader.read_bytes(guid_len)?.to_vec();
        let header: PvfHeader = reader.read_struct()?;
        let (format_version, directory_len, directory_checksum, entry_count) = (
            header.format_version,
            header.directory_len as usize,
            header.directory_checksum,
            header.entry_count,
        );

        if directory_len % 4 != 0 {
            return Err(Error::InvalidHeader(format!(
                "directory length {directory_len} is not a multiple of 4"
            )));
        }
        if directory_len > reader.remaining() {
            return Err(Error::InvalidHeader(format!(
                "directory length {directory_len} exceeds file size"
            )));
        }
        if entry_count < 0 || entry_count as usize * PvfHeader::MIN_RECORD_LEN > directory_len {
            return Err(Error::InvalidHeader(format!(
                "entry count {entry_count} does not fit a {directory_len} byte directory"
            )));
        }

        let directory_start = reader.position();
        let mut directory = reader.read_bytes(directory_len)?.to_vec();
        crypto::decrypt_in_place(&mut directory, directory_checksum)?;

        let actual = crc::derive_checksum(&directory, entry_count as u32);
        if actual != directory_checksum {
            return Err(Error::DirectoryChecksum {
                expected: directory_checksum,
                actual,
            });
        }

        let data_start = directory_start + directory_len;
        let available = mmap.len() - data_start;
        let total = entry_count as usize;
        let mut steps = Steps::new(progress, total);
        let mut entries = BTreeMap::new();
        let mut directory_reader = BinaryReader::new(&directory);

        for index in 0..total {
            let record = DirectoryRecord::read(&mut directory_reader)?;
            let key = normalize_key(&String::from_utf8_lossy(&record.name));
            if key.is_empty() {
                return Err(Error::InvalidKey(String::from_utf8_lossy(&record.name).into_owned()));
            }

            let offset = record.offset as usize;
            let len = crate::entry::block_len(record.data_len) as usize;
            if offset + len > available {
                return Err(Error::EntryOutOfBounds {
                    key,
                    offset,
                    len,
                    available,
                });
            }

            if entries.contains_key(&key) {
                return Err(Error::DuplicateKey(key));
            }
            entries.insert(key.clone(), Entry::from_record(key, record));
            steps.tick(index + 1);
        }
        if total == 0 {
            steps.tick(0);
        }

        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            directory_len,
            "opened archive"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            source: Some(mmap),
            data_start,
            guid,
            format_version,
            entries,
        })
    }

    /// Get the path the archive was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the opaque archive GUID.
    pub fn guid(&self) -> &[u8] {
        &self.guid
    }

    /// Get the format version.
    pub fn format_version(&self) -> i32 {
        self.format_version
    }

    /// Get the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Check if an entry exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    /// Get an entry without loading it.
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.get(&normalize_key(key))
    }

    /// Iterate over all entries.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.entries.values()
    }

    /// Get metadata for every entry.
    pub fn entry_infos(&self) -> Vec<EntryInfo> {
        self.entries.values().map(Entry::info).collect()
    }

    /// Read an entry's payload, decrypting and caching it on first access.
    pub fn read(&mut self, key: &str) -> Result<&[u8]> {
        let key = normalize_key(key);
        let Self {
            source,
            data_start,
            entries,
            ..
        } = self;
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| Error::EntryNotFound(key.clone()))?;

        if let Some(offset) = entry.source_offset().filter(|_| !entry.is_loaded()) {
            let source = source
                .as_deref()
                .ok_or_else(|| Error::SourceUnavailable(key.clone()))?;
            let block = decrypt_block(source, *data_start, offset, entry)?;
            entry.cache(block);
        }

        entry
            .data()
            .ok_or_else(|| Error::SourceUnavailable(key.clone()))
    }

    /// Write an entry's payload, creating the entry if needed.
    pub fn write(&mut self, key: &str, data: &[u8]) -> Result<()> {
        let key = normalize_key(key);
        match self.entries.get_mut(&key) {
            Some(entry) => entry.write_data(data),
            None => self.insert(&key, data),
        }
    }

    /// Insert a new entry. Fails if the key already exists.
    pub fn insert(&mut self, key: &str, data: &[u8]) -> Result<()> {
        let key = normalize_key(key);
        if key_path(&key).is_none() {
            return Err(Error::InvalidKey(key));
        }
        if self.entries.contains_key(&key) {
            return Err(Error::EntryExists(key));
        }
        let entry = Entry::new(key.clone(), data)?;
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Remove an entry.
    pub fn remove(&mut self, key: &str) -> Result<Entry> {
        let key = normalize_key(key);
        self.entries
            .remove(&key)
            .ok_or(Error::EntryNotFound(key))
    }

    /// Move an entry to a new key.
    ///
    /// The name checksum seeds the payload checksum, so the entry is
    /// recreated under the new name rather than relabelled.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let to_key = normalize_key(to);
        if self.entries.contains_key(&to_key) {
            return Err(Error::EntryExists(to_key));
        }
        let data = self.read(from)?.to_vec();
        self.insert(&to_key, &data)?;
        self.remove(from)?;
        Ok(())
    }

    /// Decrypt every stored entry and return the keys whose checksum does
    /// not match. Does not populate the cache.
    pub fn verify(&self, progress: impl FnMut(usize, usize)) -> Result<Vec<String>> {
        let mut steps = Steps::new(progress, self.entries.len());
        let mut mismatched = Vec::new();

        for (index, entry) in self.entries.values().enumerate() {
            let valid = match (entry.block(), entry.source_offset()) {
                (Some(block), _) => crc::derive_checksum(block, entry.name_checksum()) == entry.checksum(),
                (None, Some(offset)) => {
                    let source = self
                        .source
                        .as_deref()
                        .ok_or_else(|| Error::SourceUnavailable(entry.key().to_string()))?;
                    let block = decrypt_block(source, self.data_start, offset, entry)?;
                    crc::derive_checksum(&block, entry.name_checksum()) == entry.checksum()
                }
                (None, None) => false,
            };
            if !valid {
                mismatched.push(entry.key().to_string());
            }
            steps.tick(index + 1);
        }

        Ok(mismatched)
    }

    /// Save the archive.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.save_with_progress(path, |_, _| {})
    }

    /// Save the archive, reporting `(done, total)` entry blocks written.
    ///
    /// After a successful save the archive is reopened from `path`, so every
    /// entry is unchanged and later saves copy from the new file.
    pub fn save_with_progress<P: AsRef<Path>>(
        &mut self,
        path: P,
        progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        let path = path.as_ref();

        let mut order: Vec<&Entry> = self.entries.values().collect();
        order.sort_by(|a, b| {
            a.name_checksum()
                .cmp(&b.name_checksum())
                .then_with(|| a.key().cmp(b.key()))
        });

        let mut directory = Vec::new();
        let mut offset = 0usize;
        for entry in &order {
            let record_offset = i32::try_from(offset).map_err(|_| Error::OffsetOverflow(offset))?;
            DirectoryRecord {
                name_checksum: entry.name_checksum(),
                name: entry.name().to_vec(),
                data_len: entry.data_len(),
                checksum: entry.checksum(),
                offset: record_offset as u32,
            }
            .write_to(&mut directory);
            offset += entry.block_len() as usize;
        }
        if i32::try_from(offset).is_err() {
            return Err(Error::OffsetOverflow(offset));
        }
        directory.resize(directory.len().div_ceil(4) * 4, 0);

        let entry_count =
            i32::try_from(order.len()).map_err(|_| Error::OffsetOverflow(order.len()))?;
        let directory_checksum = crc::derive_checksum(&directory, entry_count as u32);
        crypto::encrypt_in_place(&mut directory, directory_checksum)?;

        let header = PvfHeader {
            format_version: self.format_version,
            directory_len: directory.len() as u32,
            directory_checksum,
            entry_count,
        };

        let in_place = self.is_source(path);
        let target = if in_place {
            temp_path(path)
        } else {
            path.to_path_buf()
        };

        let mut out = BufWriter::new(File::create(&target)?);
        out.write_u32::<LittleEndian>(self.guid.len() as u32)?;
        out.write_all(&self.guid)?;
        out.write_all(header.as_bytes())?;
        out.write_all(&directory)?;

        let mut steps = Steps::new(progress, order.len());
        let mut encrypted = 0usize;
        for (index, entry) in order.iter().enumerate() {
            match (entry.source_offset(), entry.block()) {
                (Some(offset), _) => {
                    let source = self
                        .source
                        .as_deref()
                        .ok_or_else(|| Error::SourceUnavailable(entry.key().to_string()))?;
                    out.write_all(source_block(source, self.data_start, offset, entry)?)?;
                }
                (None, Some(block)) => {
                    out.write_all(&crypto::encrypt(block, entry.checksum())?)?;
                    encrypted += 1;
                }
                (None, None) => return Err(Error::SourceUnavailable(entry.key().to_string())),
            }
            steps.tick(index + 1);
        }
        if order.is_empty() {
            steps.tick(0);
        }

        out.write_all(TRAILER)?;
        out.into_inner().map_err(|e| e.into_error())?.sync_all()?;

        if in_place {
            fs::rename(&target, path)?;
        }

        tracing::debug!(
            path = %path.display(),
            entries = order.len(),
            encrypted,
            "saved archive"
        );

        *self = Self::open(path)?;
        Ok(())
    }

    /// Check whether `path` names the file this archive was opened from.
    fn is_source(&self, path: &Path) -> bool {
        let Some(source) = &self.path else {
            return false;
        };
        match (fs::canonicalize(source), fs::canonicalize(path)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for PvfArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PvfArchive")
            .field("path", &self.path)
            .field("format_version", &self.format_version)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Slice an entry's ciphertext out of the source file.
fn source_block<'a>(source: &'a [u8], data_start: usize, offset: u32, entry: &Entry) -> Result<&'a [u8]> {
    let start = data_start + offset as usize;
    let len = entry.block_len() as usize;
    source.get(start..start + len).ok_or_else(|| Error::EntryOutOfBounds {
        key: entry.key().to_string(),
        offset: offset as usize,
        len,
        available: source.len().saturating_sub(data_start),
    })
}

/// Decrypt an entry's block from the source file, warning on checksum mismatch.
fn decrypt_block(source: &[u8], data_start: usize, offset: u32, entry: &Entry) -> Result<Vec<u8>> {
    let block = crypto::decrypt(source_block(source, data_start, offset, entry)?, entry.checksum())?;
    let actual = crc::derive_checksum(&block, entry.name_checksum());
    if actual != entry.checksum() {
        tracing::warn!(
            key = entry.key(),
            expected = entry.checksum(),
            actual,
            "entry checksum mismatch"
        );
    }
    Ok(block)
}

/// Sibling path used while overwriting the source file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> PvfArchive {
        let mut archive = PvfArchive::new(b"guid-bytes".to_vec(), 7);
        archive.insert("test.txt", b"hello").unwrap();
        archive.insert("Character/Swordman/Attack.ani", &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        archive.insert("empty.lst", &[]).unwrap();
        archive
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("\\Character\\Swordman.chr"), "character/swordman.chr");
        assert_eq!(normalize_key(" /a/B "), "a/b");
    }

    #[test]
    fn test_key_path() {
        assert_eq!(key_path("a/b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(key_path(&normalize_key("a/../../etc/passwd")), None);
        assert_eq!(key_path(".."), None);
        assert_eq!(key_path("./a"), None);
        assert_eq!(key_path("/abs"), None);
        assert_eq!(key_path(""), None);

        let base = Path::new("out");
        let joined = base.join(key_path("character/swordman.chr").unwrap());
        assert!(joined.starts_with(base));
    }

    #[test]
    fn test_insert_rejects_escaping_keys() {
        let mut archive = PvfArchive::new(Vec::new(), DEFAULT_FORMAT_VERSION);
        assert!(matches!(
            archive.insert("a/../../x", b"data"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(archive.write("../x", b"data"), Err(Error::InvalidKey(_))));
        archive.insert("a/b", b"data").unwrap();
        assert!(archive.rename("a/b", "../b").is_err());
        assert!(archive.contains("a/b"));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pvf");

        let mut archive = sample();
        archive.save(&path).unwrap();

        let mut reopened = PvfArchive::open(&path).unwrap();
        assert_eq!(reopened.guid(), b"guid-bytes");
        assert_eq!(reopened.format_version(), 7);
        assert_eq!(
            reopened.keys().collect::<Vec<_>>(),
            vec!["character/swordman/attack.ani", "empty.lst", "test.txt"]
        );
        assert!(!reopened.entry("test.txt").unwrap().is_loaded());
        assert_eq!(reopened.read("TEST.TXT").unwrap(), b"hello");
        assert!(reopened.entry("test.txt").unwrap().is_loaded());
        assert!(!reopened.entry("test.txt").unwrap().is_changed());
        assert_eq!(reopened.read("empty.lst").unwrap(), b"");
        assert!(reopened.verify(|_, _| {}).unwrap().is_empty());
    }

    #[test]
    fn test_five_byte_entry_layout() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.pvf");
        let second = dir.path().join("second.pvf");

        let mut archive = PvfArchive::new(Vec::new(), DEFAULT_FORMAT_VERSION);
        archive.insert("test.txt", b"12345").unwrap();
        archive.save(&first).unwrap();

        let mut archive = PvfArchive::open(&first).unwrap();
        assert_eq!(archive.read("test.txt").unwrap(), b"12345");
        archive.save(&second).unwrap();

        let archive = PvfArchive::open(&second).unwrap();
        let entry = archive.entry("test.txt").unwrap();
        assert_eq!(entry.data_len(), 5);
        assert_eq!(entry.block_len(), 8);

        let source = archive.source.as_deref().unwrap();
        let offset = entry.source_offset().unwrap();
        let raw = source_block(source, archive.data_start, offset, entry).unwrap();
        let plain = crypto::decrypt(raw, entry.checksum()).unwrap();
        assert_eq!(plain, b"12345\0\0\0");
    }

    #[test]
    fn test_unchanged_entries_are_byte_stable() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.pvf");
        let second = dir.path().join("second.pvf");

        let mut archive = sample();
        archive.save(&first).unwrap();
        let before = PvfArchive::open(&first).unwrap();

        let mut archive = PvfArchive::open(&first).unwrap();
        archive.read("test.txt").unwrap();
        archive.write("empty.lst", b"now with data").unwrap();
        archive.save(&second).unwrap();
        let mut after = PvfArchive::open(&second).unwrap();

        for key in ["test.txt", "character/swordman/attack.ani"] {
            let old = before.entry(key).unwrap();
            let new = after.entry(key).unwrap();
            assert_eq!(old.checksum(), new.checksum());
            let old_raw = source_block(
                before.source.as_deref().unwrap(),
                before.data_start,
                old.source_offset().unwrap(),
                old,
            )
            .unwrap();
            let new_raw = source_block(
                after.source.as_deref().unwrap(),
                after.data_start,
                new.source_offset().unwrap(),
                new,
            )
            .unwrap();
            assert_eq!(old_raw, new_raw);
        }
        assert_eq!(after.read("empty.lst").unwrap(), b"now with data");
    }

    #[test]
    fn test_save_in_place_clears_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pvf");

        let mut archive = sample();
        archive.save(&path).unwrap();

        let mut archive = PvfArchive::open(&path).unwrap();
        archive.write("test.txt", b"goodbye").unwrap();
        assert!(archive.entry("test.txt").unwrap().is_changed());
        archive.save(&path).unwrap();

        assert!(archive.entries().all(|e| !e.is_changed()));
        assert_eq!(archive.read("test.txt").unwrap(), b"goodbye");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_directory_sorted_by_name_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pvf");

        let mut archive = sample();
        archive.save(&path).unwrap();
        let archive = PvfArchive::open(&path).unwrap();

        let mut entries: Vec<&Entry> = archive.entries().collect();
        entries.sort_by_key(|e| e.source_offset());
        let checksums: Vec<u32> = entries.iter().map(|e| e.name_checksum()).collect();
        let mut sorted = checksums.clone();
        sorted.sort();
        assert_eq!(checksums, sorted);
    }

    #[test]
    fn test_progress_reports_completion() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pvf");

        let mut archive = PvfArchive::new(Vec::new(), 1);
        for i in 0..250 {
            archive.insert(&format!("file{i}.txt"), &[i as u8]).unwrap();
        }
        let mut calls = Vec::new();
        archive
            .save_with_progress(&path, |done, total| calls.push((done, total)))
            .unwrap();
        assert_eq!(calls.last(), Some(&(250, 250)));
        assert!(calls.len() <= 101);

        let mut calls = Vec::new();
        PvfArchive::open_with_progress(&path, |done, total| calls.push((done, total))).unwrap();
        assert_eq!(calls.last(), Some(&(250, 250)));
    }

    #[test]
    fn test_corrupted_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.pvf");

        let mut archive = sample();
        archive.save(&path).unwrap();
        drop(archive);

        let mut bytes = fs::read(&path).unwrap();
        // guid_len(4) + guid(10) + header(16) puts the directory at 30.
        bytes[31] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            PvfArchive::open(&path),
            Err(Error::DirectoryChecksum { .. })
        ));
    }

    #[test]
    fn test_truncated_header_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.pvf");
        fs::write(&path, [0xFF, 0xFF, 0xFF, 0x7F]).unwrap();
        assert!(matches!(PvfArchive::open(&path), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_lifecycle() {
        let mut archive = sample();

        assert!(matches!(
            archive.insert("TEST.txt", b"x"),
            Err(Error::EntryExists(_))
        ));

        archive.rename("test.txt", "renamed.txt").unwrap();
        assert!(!archive.contains("test.txt"));
        assert_eq!(archive.read("renamed.txt").unwrap(), b"hello");
        assert_eq!(
            archive.entry("renamed.txt").unwrap().name_checksum(),
            crc::name_checksum(b"renamed.txt")
        );

        archive.remove("renamed.txt").unwrap();
        assert!(matches!(
            archive.read("renamed.txt"),
            Err(Error::EntryNotFound(_))
        ));
    }
}
