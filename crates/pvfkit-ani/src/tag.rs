//! Animation item tags.
//!
//! [`ANI_TAGS`] maps every item tag to its text name and payload layout.
//! The reader, writer, compiler and decompiler all go through it.

/// Binary layout of an item payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// No payload.
    Empty,
    /// `u8`
    Byte,
    /// `u16`
    Short,
    /// `i32`
    Int,
    /// `f32`
    Float,
    /// `2 x f32`
    FloatPair,
    /// `4 x u8`
    Rgba,
    /// `u16` effect code plus effect-specific extras.
    Effect,
    /// `u16` value named by the given table.
    Enum(&'static [(u16, &'static str)]),
    /// `len:i32` + bytes
    Sound,
    /// `4 x i16`
    Clip,
}

/// One row of the item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDef {
    pub tag: u16,
    pub name: &'static str,
    pub payload: Payload,
}

pub const DAMAGE_BOX: u16 = 14;
pub const ATTACK_BOX: u16 = 15;
pub const DAMAGE_TYPE: u16 = 13;
pub const FLIP_TYPE: u16 = 24;
pub const GRAPHIC_EFFECT: u16 = 11;

pub const EFFECT_MONOCHROME: u16 = 5;
pub const EFFECT_SPACE_DISTORT: u16 = 6;

/// `[GRAPHIC EFFECT]` codes.
pub const EFFECTS: &[(u16, &str)] = &[
    (0, "NONE"),
    (1, "DODGE"),
    (2, "LINEARDODGE"),
    (3, "DARK"),
    (4, "XOR"),
    (EFFECT_MONOCHROME, "MONOCHROME"),
    (EFFECT_SPACE_DISTORT, "SPACEDISTORT"),
];

/// `[DAMAGE TYPE]` values.
pub const DAMAGE_TYPES: &[(u16, &str)] = &[(0, "NORMAL"), (1, "SUPERARMOR"), (2, "UNBREAKABLE")];

/// `[FLIP TYPE]` values.
pub const FLIP_TYPES: &[(u16, &str)] = &[(1, "HORIZON"), (2, "VERTICAL"), (3, "ALL")];

/// Every item an animation may contain, in overall or frame position.
pub const ANI_TAGS: &[ItemDef] = &[
    ItemDef { tag: 0, name: "LOOP", payload: Payload::Byte },
    ItemDef { tag: 1, name: "SHADOW", payload: Payload::Byte },
    ItemDef { tag: 3, name: "COORD", payload: Payload::Short },
    ItemDef { tag: 7, name: "IMAGE RATE", payload: Payload::FloatPair },
    ItemDef { tag: 8, name: "IMAGE ROTATE", payload: Payload::Float },
    ItemDef { tag: 9, name: "RGBA", payload: Payload::Rgba },
    ItemDef { tag: 10, name: "INTERPOLATION", payload: Payload::Byte },
    ItemDef { tag: GRAPHIC_EFFECT, name: "GRAPHIC EFFECT", payload: Payload::Effect },
    ItemDef { tag: 12, name: "DELAY", payload: Payload::Int },
    ItemDef { tag: DAMAGE_TYPE, name: "DAMAGE TYPE", payload: Payload::Enum(DAMAGE_TYPES) },
    ItemDef { tag: 16, name: "PLAY SOUND", payload: Payload::Sound },
    ItemDef { tag: 17, name: "PRELOAD", payload: Payload::Empty },
    ItemDef { tag: 23, name: "SET FLAG", payload: Payload::Int },
    ItemDef { tag: FLIP_TYPE, name: "FLIP TYPE", payload: Payload::Enum(FLIP_TYPES) },
    ItemDef { tag: 25, name: "LOOP START", payload: Payload::Empty },
    ItemDef { tag: 26, name: "LOOP END", payload: Payload::Int },
    ItemDef { tag: 27, name: "CLIP", payload: Payload::Clip },
    ItemDef { tag: 28, name: "OPERATION", payload: Payload::Short },
];

/// Box kinds, which sit outside the item list.
pub const BOXES: &[(u16, &str)] = &[(DAMAGE_BOX, "DAMAGE BOX"), (ATTACK_BOX, "ATTACK BOX")];

/// Look up an item by tag.
pub fn by_tag(tag: u16) -> Option<&'static ItemDef> {
    ANI_TAGS.iter().find(|def| def.tag == tag)
}

/// Look up an item by its bracketed name.
pub fn by_name(name: &str) -> Option<&'static ItemDef> {
    ANI_TAGS.iter().find(|def| def.name == name)
}

/// Name of an enumerated value.
pub fn enum_name(table: &[(u16, &'static str)], value: u16) -> Option<&'static str> {
    table.iter().find(|(v, _)| *v == value).map(|(_, name)| *name)
}

/// Value of an enumerated name.
pub fn enum_value(table: &[(u16, &str)], name: &str) -> Option<u16> {
    table.iter().find(|(_, n)| *n == name).map(|(v, _)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_consistent() {
        for def in ANI_TAGS {
            assert_eq!(by_tag(def.tag), Some(def));
            assert_eq!(by_name(def.name), Some(def));
            assert!(BOXES.iter().all(|(tag, _)| *tag != def.tag));
        }
        assert_eq!(by_tag(2), None);
        assert_eq!(by_name("FRAME MAX"), None);
    }

    #[test]
    fn test_enum_lookup() {
        assert_eq!(enum_name(EFFECTS, 5), Some("MONOCHROME"));
        assert_eq!(enum_value(EFFECTS, "SPACEDISTORT"), Some(6));
        assert_eq!(enum_name(FLIP_TYPES, 0), None);
        assert_eq!(enum_value(DAMAGE_TYPES, "normal"), None);
    }
}
