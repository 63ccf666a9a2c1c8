//! Script text to bytecode.

use pvfkit_common::lex::{self, Literal, Token};

use crate::bytecode::{self, Record};
use crate::string_table::StringTable;
use crate::tag;
use crate::{Error, Result};

/// A record whose string value has not been interned yet.
enum Pending {
    Value(u8, u32),
    Intern(u8, String),
}

/// Compile script text into bytecode, interning strings into `strings`.
///
/// The whole text is parsed before anything is interned, so on error the
/// string table is left untouched.
pub fn compile(text: &str, strings: &mut StringTable) -> Result<Vec<u8>> {
    Ok(bytecode::write_records(&compile_records(text, strings)?))
}

/// Compile script text into records.
pub fn compile_records(text: &str, strings: &mut StringTable) -> Result<Vec<Record>> {
    let mut pending = Vec::new();

    for spanned in lex::tokenize(text)? {
        let line = spanned.line;
        match spanned.token {
            Token::Tag(name) => pending.push(Pending::Intern(tag::SECTION, name)),
            Token::Str(s) => pending.push(Pending::Intern(tag::STRING, s)),
            Token::Link { id, name } => {
                pending.push(Pending::Value(tag::LINK_ID, id));
                pending.push(Pending::Intern(tag::LINK_NAME, name));
            }
            Token::Explicit { tag, value } => pending.push(explicit(line, tag, value)?),
            Token::Int(v) => pending.push(Pending::Value(tag::INT, int_bits(line, v)?)),
            Token::Float(v) => pending.push(Pending::Value(tag::FLOAT, v.to_bits())),
        }
    }

    Ok(pending
        .into_iter()
        .map(|p| match p {
            Pending::Value(tag, value) => Record::new(tag, value),
            Pending::Intern(tag, s) => Record::new(tag, strings.add(&s)),
        })
        .collect())
}

fn explicit(line: usize, tag: u8, value: Literal) -> Result<Pending> {
    let def = tag::lookup(tag).ok_or_else(|| Error::Compile {
        line,
        message: format!("unknown record type {tag}"),
    })?;

    match value {
        Literal::Str(s) if def.shape.is_string() => Ok(Pending::Intern(tag, s)),
        Literal::Str(_) => Err(Error::Compile {
            line,
            message: format!("record type {tag} ({}) does not take a string", def.name),
        }),
        Literal::Int(v) => Ok(Pending::Value(tag, int_bits(line, v)?)),
        Literal::Float(v) if !def.shape.is_string() => Ok(Pending::Value(tag, v.to_bits())),
        Literal::Float(_) => Err(Error::Compile {
            line,
            message: format!("record type {tag} ({}) does not take a float", def.name),
        }),
    }
}

/// Raw bits of an integer that fits either `i32` or `u32`.
fn int_bits(line: usize, v: i64) -> Result<u32> {
    if v < i64::from(i32::MIN) || v > i64::from(u32::MAX) {
        return Err(Error::Compile {
            line,
            message: format!("integer {v} does not fit in 32 bits"),
        });
    }
    Ok(v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lone_string() {
        let mut strings = StringTable::new();
        let records = compile_records("`hello`", &mut strings).unwrap();
        assert_eq!(records, vec![Record::new(tag::STRING, strings.find("hello").unwrap())]);
    }

    #[test]
    fn test_items() {
        let mut strings = StringTable::new();
        let text = "#PVF_File\n\n[name]\n\t`Sword`\n\t3\t-1\t0.5\t<12::item_desc`A blade`>\t{6=`cmd`}\n";
        let records = compile_records(text, &mut strings).unwrap();

        assert_eq!(
            records,
            vec![
                Record::new(tag::SECTION, 0),
                Record::new(tag::STRING, 1),
                Record::new(tag::INT, 3),
                Record::new(tag::INT, u32::MAX),
                Record::new(tag::FLOAT, 0.5f32.to_bits()),
                Record::new(tag::LINK_ID, 12),
                Record::new(tag::LINK_NAME, 2),
                Record::new(tag::COMMAND, 3),
            ]
        );
        assert_eq!(strings.iter().collect::<Vec<_>>(), vec!["name", "Sword", "item_desc", "cmd"]);
    }

    #[test]
    fn test_binary_has_marker() {
        let mut strings = StringTable::new();
        let bytes = compile("1", &mut strings).unwrap();
        assert_eq!(bytes, [0xB0, 0xD0, 2, 1, 0, 0, 0]);
        assert!(strings.is_empty());
    }

    #[test]
    fn test_explicit_numeric_values() {
        let mut strings = StringTable::new();
        let records = compile_records("{4=2139095040} {2=1.5} {7=3}", &mut strings).unwrap();
        assert_eq!(
            records,
            vec![
                Record::new(tag::FLOAT, 0x7F80_0000),
                Record::new(tag::INT, 1.5f32.to_bits()),
                Record::new(tag::STRING, 3),
            ]
        );
    }

    #[test]
    fn test_unknown_tag_is_error() {
        let mut strings = StringTable::new();
        assert!(matches!(
            compile_records("{3=1}", &mut strings),
            Err(Error::Compile { line: 1, .. })
        ));
    }

    #[test]
    fn test_string_value_needs_string_tag() {
        let mut strings = StringTable::new();
        assert!(compile_records("{2=`x`}", &mut strings).is_err());
        assert!(compile_records("{9=`x`}", &mut strings).is_err());
    }

    #[test]
    fn test_integer_range() {
        let mut strings = StringTable::new();
        assert!(compile_records("4294967295 -2147483648", &mut strings).is_ok());
        assert!(compile_records("4294967296", &mut strings).is_err());
        assert!(compile_records("-2147483649", &mut strings).is_err());
    }

    #[test]
    fn test_failed_compile_leaves_table_untouched() {
        let mut strings = StringTable::new();
        assert!(compile_records("`a` [b] `unterminated", &mut strings).is_err());
        assert!(compile_records("`a` [b] {99=1}", &mut strings).is_err());
        assert!(strings.is_empty());
        assert!(!strings.is_modified());
    }
}
