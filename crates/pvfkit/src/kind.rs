//! Content kinds of archive entries.

use pvfkit_script::STRING_TABLE_KEY;

/// How an entry's bytes are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EntryKind {
    /// Opaque bytes.
    Raw,
    /// Compiled script, presented as script text.
    Script,
    /// The archive's string table, presented one string per line.
    StringTable,
    /// Animation, presented as animation text.
    Animation,
}

impl EntryKind {
    /// Classify an entry from its key and stored bytes.
    pub fn detect(key: &str, data: &[u8]) -> Self {
        if key == STRING_TABLE_KEY {
            EntryKind::StringTable
        } else if pvfkit_script::is_script(data) {
            EntryKind::Script
        } else if pvfkit_ani::is_animation_key(key) {
            EntryKind::Animation
        } else {
            EntryKind::Raw
        }
    }

    /// Get a short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            EntryKind::Raw => "raw",
            EntryKind::Script => "script",
            EntryKind::StringTable => "stringtable",
            EntryKind::Animation => "animation",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
