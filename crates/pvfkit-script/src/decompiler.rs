//! Script bytecode to text.

use pvfkit_common::TEXT_HEADER;

use crate::bytecode::{self, Record};
use crate::link::LinkTable;
use crate::string_table::StringTable;
use crate::tag::{self, Shape};
use crate::{Error, Result};

/// Decompile script bytecode into text.
///
/// Link references are annotated with display text when `links` resolves
/// them.
pub fn decompile(data: &[u8], strings: &StringTable, links: Option<&LinkTable>) -> Result<String> {
    let records = bytecode::read_records(data)?;
    decompile_records(&records, strings, links)
}

/// Decompile records into text.
pub fn decompile_records(
    records: &[Record],
    strings: &StringTable,
    links: Option<&LinkTable>,
) -> Result<String> {
    let mut writer = Writer::new();
    let mut i = 0;

    while i < records.len() {
        let record = records[i];
        let def = tag::lookup(record.tag).ok_or(Error::UnknownTag(record.tag))?;

        match def.shape {
            Shape::Section => writer.section(section_name(strings.get(record.value))?),
            Shape::Str => writer.alone(quoted(strings.get(record.value))?),
            Shape::Command | Shape::Separator => {
                writer.item(format!("{{{}={}}}", record.tag, quoted(strings.get(record.value))?))
            }
            Shape::Int => writer.item(render_int(record.value)),
            Shape::Float => writer.item(render_float(record.value)),
            Shape::LinkId => match records.get(i + 1) {
                Some(next) if next.tag == tag::LINK_NAME => {
                    writer.item(render_link(record.value, strings.get(next.value), links)?);
                    i += 1;
                }
                _ => writer.item(format!("{{{}={}}}", tag::LINK_ID, record.value)),
            },
            Shape::LinkName => writer.item(format!(
                "{{{}={}}}",
                tag::LINK_NAME,
                quoted(strings.get(record.value))?
            )),
        }
        i += 1;
    }

    Ok(writer.finish())
}

/// Accumulates tab-separated items into lines.
struct Writer {
    out: String,
    line: Vec<String>,
    indent: bool,
}

impl Writer {
    fn new() -> Self {
        let mut out = String::from(TEXT_HEADER);
        out.push('\n');
        Self {
            out,
            line: Vec::new(),
            indent: false,
        }
    }

    fn flush(&mut self) {
        if self.line.is_empty() {
            return;
        }
        if self.indent {
            self.out.push('\t');
        }
        self.out.push_str(&self.line.join("\t"));
        self.out.push('\n');
        self.line.clear();
    }

    fn section(&mut self, name: &str) {
        self.flush();
        if name.starts_with('/') {
            self.out.push_str(&format!("[{name}]\n"));
            self.indent = false;
        } else {
            self.out.push_str(&format!("\n[{name}]\n"));
            self.indent = true;
        }
    }

    fn alone(&mut self, item: String) {
        self.flush();
        self.line.push(item);
        self.flush();
    }

    fn item(&mut self, item: String) {
        self.line.push(item);
    }

    fn finish(mut self) -> String {
        self.flush();
        self.out
    }
}

fn quoted(s: &str) -> Result<String> {
    if s.contains(['`', '\n', '\r']) {
        return Err(Error::UnrepresentableString(s.to_string()));
    }
    Ok(format!("`{s}`"))
}

fn section_name(s: &str) -> Result<&str> {
    if s.contains([']', '\n', '\r']) {
        return Err(Error::UnrepresentableString(s.to_string()));
    }
    Ok(s)
}

fn render_link(id: u32, name: &str, links: Option<&LinkTable>) -> Result<String> {
    if name.contains(['`', '>', '\n', '\r']) {
        return Err(Error::UnrepresentableString(name.to_string()));
    }
    let display = links
        .and_then(|links| links.get(id, name))
        .filter(|d| !d.is_empty() && !d.contains(['`', '>', '\n', '\r']));
    Ok(match display {
        Some(display) => format!("<{id}::{name}`{display}`>"),
        None => format!("<{id}::{name}>"),
    })
}

/// Render a float record. The text always contains a decimal point so it
/// compiles back to a float.
fn render_float(bits: u32) -> String {
    let value = f32::from_bits(bits);
    if !value.is_finite() {
        return format!("{{{}={bits}}}", tag::FLOAT);
    }
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Render an int record, guessing whether the bits are really a float.
///
/// Values whose bit pattern is a normal float with a fractional part and a
/// magnitude in `[1e-4, 1e6)` print as floats, and therefore compile back
/// as float records. This is lossy for integers that happen to share such a
/// bit pattern.
fn render_int(bits: u32) -> String {
    let value = f32::from_bits(bits);
    if looks_like_float(value) {
        let mut text = format!("{value:.6}");
        let trimmed = text.trim_end_matches('0').len();
        text.truncate(trimmed);
        if text.ends_with('.') {
            text.push('0');
        }
        text
    } else {
        (bits as i32).to_string()
    }
}

fn looks_like_float(value: f32) -> bool {
    value.is_normal() && value.fract() != 0.0 && (1e-4..1e6).contains(&value.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, compile_records};

    fn round_trip(text: &str) -> String {
        let mut strings = StringTable::new();
        let bytes = compile(text, &mut strings).unwrap();
        decompile(&bytes, &strings, None).unwrap()
    }

    #[test]
    fn test_lone_string_scenario() {
        let mut strings = StringTable::new();
        let bytes = compile("`hello`", &mut strings).unwrap();
        let text = decompile(&bytes, &strings, None).unwrap();
        assert_eq!(text, "#PVF_File\n`hello`\n");
        assert_eq!(text.lines().nth(1), Some("`hello`"));
    }

    #[test]
    fn test_layout() {
        let text = "#PVF_File\n\n[name]\n\t`Short Sword`\n\n[attack]\n\t10\t-20\t1.5\n[/attack]\n";
        assert_eq!(round_trip(text), text);
    }

    #[test]
    fn test_round_trip_is_stable() {
        let source = "[a] 1 2 `s` {6=`cmd`} {8=`,`} <3::name> {9=4} {10=`n`} 0.25 -7";
        let first = round_trip(source);
        assert_eq!(round_trip(&first), first);

        let mut strings = StringTable::new();
        let a = compile_records(source, &mut strings).unwrap();
        let b = compile_records(&first, &mut strings).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unpaired_links() {
        let mut strings = StringTable::new();
        let idx = strings.add("orphan");
        let records = [
            Record::new(tag::LINK_ID, 4),
            Record::new(tag::INT, 1),
            Record::new(tag::LINK_NAME, idx),
        ];
        let text = decompile_records(&records, &strings, None).unwrap();
        assert_eq!(text, "#PVF_File\n{9=4}\t1\t{10=`orphan`}\n");
    }

    #[test]
    fn test_link_display() {
        let mut strings = StringTable::new();
        let bytes = compile("<3::sword>", &mut strings).unwrap();
        let mut links = LinkTable::new();
        links.insert(3, "sword", "Short Sword");

        let text = decompile(&bytes, &strings, Some(&links)).unwrap();
        assert_eq!(text, "#PVF_File\n<3::sword`Short Sword`>\n");

        // The display part is ignored when compiling.
        let mut again = StringTable::new();
        assert_eq!(compile(&text, &mut again).unwrap(), bytes);
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(render_float(1.0f32.to_bits()), "1.0");
        assert_eq!(render_float(0.1f32.to_bits()), "0.1");
        assert_eq!(render_float((-2.5f32).to_bits()), "-2.5");
        assert_eq!(render_float(f32::INFINITY.to_bits()), "{4=2139095040}");
        assert_eq!(render_float(f32::NAN.to_bits()), format!("{{4={}}}", f32::NAN.to_bits()));
    }

    #[test]
    fn test_non_finite_float_round_trips() {
        let records = [Record::new(tag::FLOAT, f32::NEG_INFINITY.to_bits())];
        let strings = StringTable::new();
        let text = decompile_records(&records, &strings, None).unwrap();
        let mut strings = StringTable::new();
        assert_eq!(compile_records(&text, &mut strings).unwrap(), records);
    }

    #[test]
    fn test_int_heuristic_plain_integers() {
        for v in [0i32, 1, -1, 100, 65535, i32::MAX, i32::MIN] {
            assert_eq!(render_int(v as u32), v.to_string());
        }
        // 1.0 has no fractional part.
        assert_eq!(render_int(1.0f32.to_bits()), "1065353216");
    }

    // Integers whose bits look like a float are rendered as that float and
    // recompile as a float record with the same bits but a different tag.
    #[test]
    fn test_int_heuristic_flagged_values() {
        let flagged = [(0.5f32, "0.5"), (-3.25, "-3.25"), (0.0001, "0.0001"), (100.125, "100.125")];
        for (value, expected) in flagged {
            let bits = value.to_bits();
            assert_eq!(render_int(bits), expected);

            let records = [Record::new(tag::INT, bits)];
            let text = decompile_records(&records, &StringTable::new(), None).unwrap();
            let mut strings = StringTable::new();
            let recompiled = compile_records(&text, &mut strings).unwrap();
            assert_eq!(recompiled, vec![Record::new(tag::FLOAT, bits)]);
        }

        // Out of range magnitudes stay integers.
        assert_eq!(render_int(1e7f32.to_bits() | 1), (1e7f32.to_bits() | 1).to_string());
        assert_eq!(render_int(0.00001f32.to_bits()), 0.00001f32.to_bits().to_string());
    }

    #[test]
    fn test_errors() {
        let mut strings = StringTable::new();
        let tick = strings.add("a`b");
        let bracket = strings.add("a]b");

        assert!(matches!(
            decompile_records(&[Record::new(3, 0)], &strings, None),
            Err(Error::UnknownTag(3))
        ));
        assert!(matches!(
            decompile_records(&[Record::new(tag::STRING, tick)], &strings, None),
            Err(Error::UnrepresentableString(_))
        ));
        assert!(decompile_records(&[Record::new(tag::SECTION, bracket)], &strings, None).is_err());
        assert!(decompile(b"not a script", &strings, None).is_err());
    }

    #[test]
    fn test_missing_string_uses_placeholder() {
        let text = decompile_records(&[Record::new(tag::STRING, 99)], &StringTable::new(), None).unwrap();
        assert_eq!(text, "#PVF_File\n``\n");
    }
}
