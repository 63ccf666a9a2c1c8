//! Display strings for `<id::name>` references.
//!
//! The archive keeps an index list (`n_string.lst`) pairing numeric ids with
//! paths of `.str` entries. Each `.str` entry holds `name>display` lines.

use rustc_hash::FxHashMap;

use crate::bytecode::{self, Record};
use crate::string_table::StringTable;
use crate::{tag, Result};

/// Key of the link index list inside an archive.
pub const LINK_LIST_KEY: &str = "n_string.lst";

/// Look-aside table resolving `(id, name)` pairs to display text.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: FxHashMap<u32, FxHashMap<String, String>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from the index list and the `.str` entries it names.
    ///
    /// `fetch` returns the raw contents of an entry by path, or `None` when
    /// it is missing. Missing entries are skipped.
    pub fn load(
        list: &[u8],
        strings: &StringTable,
        mut fetch: impl FnMut(&str) -> Option<Vec<u8>>,
    ) -> Result<Self> {
        let records = bytecode::read_records(list)?;
        let mut table = Self::new();

        for (id, path) in index_pairs(&records) {
            let path = strings.get(path);
            let Some(data) = fetch(path) else {
                tracing::warn!(id, path, "link table entry not found");
                continue;
            };
            table.extend_from_text(id, &String::from_utf8_lossy(&data));
        }

        tracing::debug!(ids = table.links.len(), "loaded link table");
        Ok(table)
    }

    /// Add every `name>display` line of a `.str` entry under `id`.
    pub fn extend_from_text(&mut self, id: u32, text: &str) {
        for line in text.lines() {
            if let Some((name, display)) = line.split_once('>') {
                let name = name.trim();
                if !name.is_empty() {
                    self.insert(id, name, display.trim());
                }
            }
        }
    }

    pub fn insert(&mut self, id: u32, name: impl Into<String>, display: impl Into<String>) {
        self.links
            .entry(id)
            .or_default()
            .insert(name.into(), display.into());
    }

    /// Resolve a reference to its display text.
    pub fn get(&self, id: u32, name: &str) -> Option<&str> {
        self.links.get(&id)?.get(name).map(String::as_str)
    }

    /// Number of distinct ids.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// `(id, path index)` pairs: an int record directly followed by a string.
fn index_pairs(records: &[Record]) -> Vec<(u32, u32)> {
    let mut pairs = Vec::new();
    let mut i = 0;
    while i + 1 < records.len() {
        let (a, b) = (records[i], records[i + 1]);
        if a.tag == tag::INT && b.tag == tag::STRING {
            pairs.push((a.value, b.value));
            i += 2;
        } else {
            i += 1;
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;

    #[test]
    fn test_extend_from_text() {
        let mut table = LinkTable::new();
        table.extend_from_text(3, "name_1>Short Sword\n\nbroken line\n name_2 > Long Sword \r\n");
        assert_eq!(table.get(3, "name_1"), Some("Short Sword"));
        assert_eq!(table.get(3, "name_2"), Some("Long Sword"));
        assert_eq!(table.get(3, "broken line"), None);
        assert_eq!(table.get(4, "name_1"), None);
    }

    #[test]
    fn test_load_from_list() {
        let mut strings = StringTable::new();
        let list = compiler::compile(
            "#PVF_File\n1\t`equipment/equipment.str`\n2\t`missing.str`\n",
            &mut strings,
        )
        .unwrap();

        let mut requested = Vec::new();
        let table = LinkTable::load(&list, &strings, |path| {
            requested.push(path.to_string());
            (path == "equipment/equipment.str").then(|| b"sword>Sword".to_vec())
        })
        .unwrap();

        assert_eq!(requested, vec!["equipment/equipment.str", "missing.str"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1, "sword"), Some("Sword"));
    }

    #[test]
    fn test_load_rejects_non_script() {
        let strings = StringTable::new();
        assert!(LinkTable::load(b"plain text", &strings, |_| None).is_err());
    }
}
