//! Animation binary to text.

use std::fmt::Write;

use pvfkit_common::TEXT_HEADER;

use crate::model::{Animation, EffectExtra, Frame, Item, Value, Warning};
use crate::tag::{self, Payload};
use crate::{Error, Result};

/// Text produced from an animation entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Decompiled {
    pub text: String,
    pub warnings: Vec<Warning>,
}

/// Decompile an animation entry into text.
pub fn decompile(data: &[u8]) -> Result<Decompiled> {
    let (animation, warnings) = Animation::read(data)?;
    for warning in &warnings {
        tracing::warn!(%warning, "animation decompiled with warnings");
    }
    Ok(Decompiled {
        text: to_text(&animation)?,
        warnings,
    })
}

/// Render an animation as text.
pub fn to_text(animation: &Animation) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{TEXT_HEADER}").ok();

    for item in &animation.overall {
        out.push('\n');
        write_item(&mut out, item, "")?;
    }

    write!(out, "\n[FRAME MAX]\n\t{}\n", animation.frames.len()).ok();

    for (index, frame) in animation.frames.iter().enumerate() {
        write!(out, "\n[FRAME{index:03}]\n").ok();
        write_frame(&mut out, frame, &animation.images)?;
    }

    Ok(out)
}

fn write_frame(out: &mut String, frame: &Frame, images: &[String]) -> Result<()> {
    for b in &frame.boxes {
        let name = tag::enum_name(tag::BOXES, b.tag).ok_or(Error::UnknownTag(b.tag))?;
        writeln!(out, "\t[{name}]\n\t\t{}", join(b.bounds)).ok();
    }

    // An empty path is how the text form spells "no image".
    let path = match frame.image {
        Some(index) => {
            let path = images
                .get(index as usize)
                .ok_or(Error::InvalidImage(index as i16))?;
            if path.is_empty() {
                return Err(Error::Unrepresentable(format!("empty path for image {index}")));
            }
            path.as_str()
        }
        None => "",
    };
    writeln!(out, "\t[IMAGE]\n\t\t{}\n\t\t{}", quoted(path)?, frame.sub_index).ok();
    writeln!(out, "\t[IMAGE POS]\n\t\t{}\t{}", frame.pos.0, frame.pos.1).ok();

    for item in &frame.items {
        write_item(out, item, "\t")?;
    }
    Ok(())
}

fn write_item(out: &mut String, item: &Item, indent: &str) -> Result<()> {
    let def = tag::by_tag(item.tag).ok_or(Error::UnknownTag(item.tag))?;
    let value = match (&item.value, def.payload) {
        (Value::Empty, Payload::Empty) => None,
        (Value::Byte(v), Payload::Byte) => Some(v.to_string()),
        (Value::Short(v), Payload::Short) => Some(v.to_string()),
        (Value::Int(v), Payload::Int) => Some(v.to_string()),
        (Value::Float(v), Payload::Float) => Some(float(*v)?),
        (Value::FloatPair(a, b), Payload::FloatPair) => Some(format!("{}\t{}", float(*a)?, float(*b)?)),
        (Value::Rgba(rgba), Payload::Rgba) => Some(join(*rgba)),
        (Value::Effect { code, extra }, Payload::Effect) => {
            let name = tag::enum_name(tag::EFFECTS, *code).ok_or(Error::UnknownEnum {
                tag: item.tag,
                value: *code,
            })?;
            Some(match extra {
                EffectExtra::None => format!("`{name}`"),
                EffectExtra::Monochrome(rgb) => format!("`{name}`\t{}", join(*rgb)),
                EffectExtra::SpaceDistort(values) => format!("`{name}`\t{}", join(*values)),
            })
        }
        (Value::Enum(v), Payload::Enum(table)) => {
            let name = tag::enum_name(table, *v).ok_or(Error::UnknownEnum {
                tag: item.tag,
                value: *v,
            })?;
            Some(format!("`{name}`"))
        }
        (Value::Sound(path), Payload::Sound) => Some(quoted(path)?),
        (Value::Clip(values), Payload::Clip) => Some(join(*values)),
        (value, _) => {
            return Err(Error::Unrepresentable(format!(
                "{value:?} for [{}]",
                def.name
            )))
        }
    };

    writeln!(out, "{indent}[{}]", def.name).ok();
    if let Some(value) = value {
        writeln!(out, "{indent}\t{value}").ok();
    }
    Ok(())
}

fn float(v: f32) -> Result<String> {
    if !v.is_finite() {
        return Err(Error::Unrepresentable(format!("float {v}")));
    }
    Ok(format!("{v:.2}"))
}

fn quoted(s: &str) -> Result<String> {
    if s.contains(['`', '\n', '\r']) {
        return Err(Error::Unrepresentable(format!("string {s:?}")));
    }
    Ok(format!("`{s}`"))
}

fn join<T: ToString, const N: usize>(values: [T; N]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\t")
}
