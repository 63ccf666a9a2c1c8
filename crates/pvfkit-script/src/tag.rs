//! Script record tags.
//!
//! [`SCRIPT_TAGS`] is the single description of what each tag carries and
//! is consulted by both the compiler and the decompiler.

/// Payload interpretation of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Signed 32-bit integer.
    Int,
    /// IEEE-754 single precision bits.
    Float,
    /// String-table index of a section name.
    Section,
    /// String-table index of a command.
    Command,
    /// String-table index of a quoted string.
    Str,
    /// String-table index of a separator.
    Separator,
    /// Numeric id of a link.
    LinkId,
    /// String-table index of a link name.
    LinkName,
}

impl Shape {
    /// Check if the value is a string-table index.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            Shape::Section | Shape::Command | Shape::Str | Shape::Separator | Shape::LinkName
        )
    }
}

/// One row of the tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDef {
    pub tag: u8,
    pub shape: Shape,
    pub name: &'static str,
}

pub const INT: u8 = 2;
pub const FLOAT: u8 = 4;
pub const SECTION: u8 = 5;
pub const COMMAND: u8 = 6;
pub const STRING: u8 = 7;
pub const SEPARATOR: u8 = 8;
pub const LINK_ID: u8 = 9;
pub const LINK_NAME: u8 = 10;

/// Every tag a script may contain.
pub const SCRIPT_TAGS: &[TagDef] = &[
    TagDef { tag: INT, shape: Shape::Int, name: "int" },
    TagDef { tag: FLOAT, shape: Shape::Float, name: "float" },
    TagDef { tag: SECTION, shape: Shape::Section, name: "section" },
    TagDef { tag: COMMAND, shape: Shape::Command, name: "command" },
    TagDef { tag: STRING, shape: Shape::Str, name: "string" },
    TagDef { tag: SEPARATOR, shape: Shape::Separator, name: "separator" },
    TagDef { tag: LINK_ID, shape: Shape::LinkId, name: "link id" },
    TagDef { tag: LINK_NAME, shape: Shape::LinkName, name: "link name" },
];

/// Look up a tag in [`SCRIPT_TAGS`].
pub fn lookup(tag: u8) -> Option<&'static TagDef> {
    SCRIPT_TAGS.iter().find(|def| def.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_consistent() {
        for (i, def) in SCRIPT_TAGS.iter().enumerate() {
            assert_eq!(lookup(def.tag), Some(def));
            assert!(SCRIPT_TAGS[i + 1..].iter().all(|d| d.tag != def.tag));
        }
        assert_eq!(lookup(0), None);
        assert_eq!(lookup(3), None);
        assert_eq!(lookup(11), None);
    }

    #[test]
    fn test_string_shapes() {
        let strings: Vec<u8> = SCRIPT_TAGS
            .iter()
            .filter(|d| d.shape.is_string())
            .map(|d| d.tag)
            .collect();
        assert_eq!(strings, vec![SECTION, COMMAND, STRING, SEPARATOR, LINK_NAME]);
    }
}
