//! Key-addressed view over an archive with per-kind codecs.

use std::fs;
use std::path::Path;

use pvfkit_archive::{normalize_key, EntryInfo, PvfArchive};
use pvfkit_common::TEXT_HEADER;
use pvfkit_script::{LinkTable, StringTable, LINK_LIST_KEY, STRING_TABLE_KEY};
use rustc_hash::FxHashMap;

use crate::{EntryKind, Error, Result};

/// An open archive whose entries are read and written in their text
/// projections where one exists.
///
/// Scripts and animations are decompiled on read and compiled on write. The
/// string table is loaded on first use and written back on save if
/// compilation added strings to it.
#[derive(Debug)]
pub struct Pvf {
    archive: PvfArchive,
    kinds: FxHashMap<String, EntryKind>,
    strings: StringTable,
    strings_loaded: bool,
    links: LinkTable,
    links_loaded: bool,
}

impl Pvf {
    /// Create an empty archive.
    pub fn new(guid: Vec<u8>, format_version: i32) -> Self {
        Self::from_archive(PvfArchive::new(guid, format_version))
    }

    /// Wrap an already opened archive.
    pub fn from_archive(archive: PvfArchive) -> Self {
        Self {
            archive,
            kinds: FxHashMap::default(),
            strings: StringTable::new(),
            strings_loaded: false,
            links: LinkTable::new(),
            links_loaded: false,
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
        Ok(Self::from_archive(PvfArchive::open_with_progress(path, progress)?))
    }

    /// Save the archive.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.save_with_progress(path, |_, _| {})
    }

    /// Save the archive, reporting `(done, total)` entry blocks written.
    pub fn save_with_progress<P: AsRef<Path>>(
        &mut self,
        path: P,
        progress: impl FnMut(usize, usize),
    ) -> Result<()> {
        if self.strings_loaded && self.strings.is_modified() {
            tracing::debug!(strings = self.strings.len(), "writing back string table");
            self.archive.write(STRING_TABLE_KEY, &self.strings.to_bytes())?;
            self.strings.mark_saved();
        }
        self.archive.save_with_progress(path, progress)?;
        Ok(())
    }

    /// Get the underlying archive.
    pub fn archive(&self) -> &PvfArchive {
        &self.archive
    }

    /// Get all keys in sorted order.
    pub fn all_keys(&self) -> Vec<String> {
        self.archive.keys().map(str::to_string).collect()
    }

    /// Get metadata for every entry.
    pub fn entry_infos(&self) -> Vec<EntryInfo> {
        self.archive.entry_infos()
    }

    /// Check if an entry exists.
    pub fn contains(&self, key: &str) -> bool {
        self.archive.contains(key)
    }

    /// Get the stored payload length of an entry.
    pub fn entry_size(&self, key: &str) -> Option<u32> {
        self.archive.entry(key).map(|e| e.data_len())
    }

    /// Get the kind of an entry, classifying it on first use.
    pub fn entry_kind(&mut self, key: &str) -> Result<EntryKind> {
        let key = normalize_key(key);
        if let Some(kind) = self.kinds.get(&key) {
            return Ok(*kind);
        }
        let kind = EntryKind::detect(&key, self.archive.read(&key)?);
        self.kinds.insert(key, kind);
        Ok(kind)
    }

    /// Read an entry's stored bytes without decoding.
    pub fn raw_bytes(&mut self, key: &str) -> Result<&[u8]> {
        Ok(self.archive.read(key)?)
    }

    /// Read an entry in its text projection, or as raw bytes if it has none
    /// or cannot be decoded.
    pub fn read_file_bytes(&mut self, key: &str) -> Result<Vec<u8>> {
        let key = normalize_key(key);
        let kind = self.entry_kind(&key)?;
        let data = self.archive.read(&key)?.to_vec();

        match kind {
            EntryKind::Raw => Ok(data),
            EntryKind::StringTable => {
                self.load_strings()?;
                Ok(self.strings.to_text().into_bytes())
            }
            EntryKind::Script => {
                self.load_links()?;
                match pvfkit_script::decompile(&data, &self.strings, Some(&self.links)) {
                    Ok(text) => Ok(text.into_bytes()),
                    Err(error) => {
                        tracing::warn!(key = %key, %error, "script decompile failed, returning raw bytes");
                        Ok(data)
                    }
                }
            }
            EntryKind::Animation => match pvfkit_ani::decompile(&data) {
                Ok(decompiled) => Ok(decompiled.text.into_bytes()),
                Err(error) => {
                    tracing::warn!(key = %key, %error, "animation decompile failed, treating as raw");
                    self.kinds.insert(key, EntryKind::Raw);
                    Ok(data)
                }
            },
        }
    }

    /// Write an entry from its text projection, creating it if needed.
    ///
    /// Text that fails to compile is stored as-is with a warning.
    ///
    /// Replacing the string table fails with
    /// [`Error::StringTableConflict`] if scripts compiled since the last save
    /// added strings and the new table does not keep every current string at
    /// its index.
    pub fn write_file_bytes(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        let key = normalize_key(key);

        if key == STRING_TABLE_KEY {
            let table = StringTable::from_text(&String::from_utf8_lossy(bytes));
            if self.strings_loaded && self.strings.is_modified() {
                if let Some(index) = self.strings.first_mismatch(&table) {
                    return Err(Error::StringTableConflict {
                        index,
                        string: self.strings.get(index).to_string(),
                    });
                }
            }
            self.kinds.remove(&key);
            self.archive.write(&key, &table.to_bytes())?;
            self.strings = table;
            self.strings.mark_saved();
            self.strings_loaded = true;
            self.links_loaded = false;
            return Ok(());
        }

        self.kinds.remove(&key);
        if key == LINK_LIST_KEY || key.ends_with(".str") {
            self.links_loaded = false;
        }

        if pvfkit_ani::is_animation_key(&key) && pvfkit_ani::is_text(bytes) {
            let text = String::from_utf8_lossy(bytes);
            match pvfkit_ani::compile(&text) {
                Ok(compiled) => self.archive.write(&key, &compiled.data)?,
                Err(error) => {
                    tracing::warn!(key = %key, %error, "animation compile failed, storing text");
                    self.archive.write(&key, bytes)?;
                }
            }
            return Ok(());
        }

        if bytes.trim_ascii_start().starts_with(TEXT_HEADER.as_bytes()) {
            self.load_strings()?;
            let text = String::from_utf8_lossy(bytes);
            match pvfkit_script::compile(&text, &mut self.strings) {
                Ok(compiled) => self.archive.write(&key, &compiled)?,
                Err(error) => {
                    tracing::warn!(key = %key, %error, "script compile failed, storing text");
                    self.archive.write(&key, bytes)?;
                }
            }
            return Ok(());
        }

        self.archive.write(&key, bytes)?;
        Ok(())
    }

    /// Write an entry's text projection to an external file.
    pub fn export_file<P: AsRef<Path>>(&mut self, key: &str, dest: P) -> Result<()> {
        let data = self.read_file_bytes(key)?;
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, data)?;
        Ok(())
    }

    /// Replace an entry with the contents of an external file.
    pub fn replace_file<P: AsRef<Path>>(&mut self, key: &str, src: P) -> Result<()> {
        let data = fs::read(src)?;
        self.write_file_bytes(key, &data)
    }

    /// Delete an entry.
    pub fn delete_file(&mut self, key: &str) -> Result<()> {
        let key = normalize_key(key);
        self.archive.remove(&key)?;
        self.kinds.remove(&key);
        if key == STRING_TABLE_KEY {
            self.strings = StringTable::new();
            self.strings_loaded = false;
        }
        Ok(())
    }

    /// Create an empty entry. Fails if it already exists.
    pub fn create_empty_file(&mut self, key: &str) -> Result<()> {
        self.archive.insert(key, &[])?;
        self.kinds.remove(&normalize_key(key));
        Ok(())
    }

    /// Move an entry to a new key.
    pub fn rename_file(&mut self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (normalize_key(from), normalize_key(to));
        self.archive.rename(&from, &to)?;
        self.kinds.remove(&from);
        self.kinds.remove(&to);
        Ok(())
    }

    /// Get the string table, loading it on first use.
    pub fn string_table(&mut self) -> Result<&StringTable> {
        self.load_strings()?;
        Ok(&self.strings)
    }

    /// Get the link table, loading it on first use.
    pub fn link_table(&mut self) -> Result<&LinkTable> {
        self.load_links()?;
        Ok(&self.links)
    }

    fn load_strings(&mut self) -> Result<()> {
        if self.strings_loaded {
            return Ok(());
        }
        self.strings = if self.archive.contains(STRING_TABLE_KEY) {
            StringTable::from_bytes(self.archive.read(STRING_TABLE_KEY)?)?
        } else {
            StringTable::new()
        };
        self.strings_loaded = true;
        tracing::debug!(strings = self.strings.len(), "loaded string table");
        Ok(())
    }

    fn load_links(&mut self) -> Result<()> {
        if self.links_loaded {
            return Ok(());
        }
        self.load_strings()?;

        self.links = if self.archive.contains(LINK_LIST_KEY) {
            let list = self.archive.read(LINK_LIST_KEY)?.to_vec();
            let archive = &mut self.archive;
            LinkTable::load(&list, &self.strings, |path| {
                archive.read(path).ok().map(<[u8]>::to_vec)
            })
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "link list unreadable, links will not be resolved");
                LinkTable::new()
            })
        } else {
            LinkTable::new()
        };
        self.links_loaded = true;
        Ok(())
    }
}
