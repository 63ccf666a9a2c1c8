//! Interning string pool referenced by script records.
//!
//! Binary layout (little-endian):
//!
//! ```text
//! [count:u32][offsets: (count + 1) x u32][string bytes]
//! ```
//!
//! Offsets are relative to byte 4, so string `i` spans
//! `4 + offsets[i] .. 4 + offsets[i + 1]`.
//!
//! The text projection holds one string per line. Backslashes and line
//! breaks inside a string are escaped as `\\`, `\n` and `\r` so that line
//! numbers always match indices.

use pvfkit_common::BinaryReader;
use rustc_hash::FxHashMap;

use crate::{Error, Result};

/// Key of the string table entry inside an archive.
pub const STRING_TABLE_KEY: &str = "stringtable.bin";

/// Returned by [`StringTable::get`] for indices outside the table.
pub const PLACEHOLDER: &str = "";

/// Index-addressed string pool.
///
/// Loaded tables may contain duplicates; [`StringTable::add`] resolves to the
/// first occurrence.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
    index: FxHashMap<String, u32>,
    modified: bool,
}

impl StringTable {
    /// Create an empty string table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a string table from its binary form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::new());
        }

        let mut reader = BinaryReader::new(data);
        let count = reader.read_u32()? as usize;
        let body = data.len() - 4;
        if count.saturating_add(1).saturating_mul(4) > body {
            return Err(Error::InvalidStringTable(format!(
                "{count} strings do not fit in {} bytes",
                data.len()
            )));
        }

        let mut offsets = Vec::with_capacity(count + 1);
        for _ in 0..=count {
            offsets.push(reader.read_u32()? as usize);
        }

        let mut table = Self::new();
        table.strings.reserve(count);
        for (i, pair) in offsets.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            if start > end || end > body {
                return Err(Error::InvalidStringTable(format!(
                    "string {i} spans {start}..{end} outside {body} bytes"
                )));
            }
            table.push(String::from_utf8_lossy(&data[4 + start..4 + end]).into_owned());
        }

        Ok(table)
    }

    /// Serialize to the binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header_len = 4 * (self.strings.len() + 1);
        let data_len: usize = self.strings.iter().map(String::len).sum();
        let mut out = Vec::with_capacity(4 + header_len + data_len);

        out.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        let mut offset = header_len;
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        for s in &self.strings {
            offset += s.len();
            out.extend_from_slice(&(offset as u32).to_le_bytes());
        }
        for s in &self.strings {
            out.extend_from_slice(s.as_bytes());
        }
        out
    }

    /// Build a table from its text projection, one string per line.
    ///
    /// Every line becomes one string, so indices match line numbers.
    pub fn from_text(text: &str) -> Self {
        let mut table = Self::new();
        for line in text.lines() {
            table.push(unescape(line));
        }
        table.modified = true;
        table
    }

    /// Render the text projection, one string per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for s in &self.strings {
            escape_into(&mut out, s);
            out.push('\n');
        }
        out
    }

    /// Index of the first string in `self` that `other` does not hold at the
    /// same index, if any.
    pub fn first_mismatch(&self, other: &StringTable) -> Option<u32> {
        self.strings
            .iter()
            .enumerate()
            .find(|(i, s)| other.strings.get(*i) != Some(*s))
            .map(|(i, _)| i as u32)
    }

    /// Get the string at `index`, or [`PLACEHOLDER`] when out of range.
    pub fn get(&self, index: u32) -> &str {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or(PLACEHOLDER)
    }

    /// Find the index of a string.
    pub fn find(&self, s: &str) -> Option<u32> {
        self.index.get(s).copied()
    }

    /// Intern a string, returning its index.
    pub fn add(&mut self, s: &str) -> u32 {
        if let Some(index) = self.find(s) {
            return index;
        }
        self.modified = true;
        self.push(s.to_string())
    }

    /// Number of strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate over all strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.strings.iter().map(String::as_str)
    }

    /// Check if strings were added since the table was loaded or saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clear the modified flag after the table has been persisted.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    fn push(&mut self, s: String) -> u32 {
        let index = self.strings.len() as u32;
        self.index.entry(s.clone()).or_insert(index);
        self.strings.push(s);
        index
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // Unknown escapes are kept verbatim.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
