//! Animation data model and its binary form.
//!
//! ```text
//! frame_count:u16
//! image_count:u16  (len:i32 path)*
//! overall_count:u16  item*
//! frame* {
//!     box_count:u16  (tag:u16 6 x i32)*
//!     image_index:i16  sub_index:u16
//!     pos_x:i32  pos_y:i32
//!     item_count:u16  item*
//! }
//! item = tag:u16 payload
//! ```

use std::fmt;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use pvfkit_common::BinaryReader;

use crate::tag::{self, Payload};
use crate::{Error, Result};

/// Extra payload carried by some graphic effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectExtra {
    None,
    Monochrome([u8; 3]),
    SpaceDistort([u16; 2]),
}

/// Decoded item payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Byte(u8),
    Short(u16),
    Int(i32),
    Float(f32),
    FloatPair(f32, f32),
    Rgba([u8; 4]),
    Effect { code: u16, extra: EffectExtra },
    Enum(u16),
    Sound(String),
    Clip([i16; 4]),
}

/// A tagged item, either overall or per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub tag: u16,
    pub value: Value,
}

/// A hit or hurt box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxItem {
    /// [`tag::DAMAGE_BOX`] or [`tag::ATTACK_BOX`].
    pub tag: u16,
    pub bounds: [i32; 6],
}

/// One animation frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub boxes: Vec<BoxItem>,
    /// Index into [`Animation::images`], or `None` for no image.
    pub image: Option<u16>,
    pub sub_index: u16,
    pub pos: (i32, i32),
    pub items: Vec<Item>,
}

/// A decoded animation entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub images: Vec<String>,
    pub overall: Vec<Item>,
    pub frames: Vec<Frame>,
}

/// A recoverable problem found while converting an animation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// `[FRAME MAX]` does not match the number of frame blocks.
    FrameCount { declared: u32, actual: usize },
    /// A frame block is numbered out of sequence or repeats a number.
    FrameIndex { expected: usize, found: u32 },
    /// Bytes left over after the last frame.
    TrailingBytes(usize),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::FrameCount { declared, actual } => write!(
                f,
                "[FRAME MAX] declares {declared} frames but {actual} are present"
            ),
            Warning::FrameIndex { expected, found } => {
                write!(f, "frame [FRAME{found:03}] found where [FRAME{expected:03}] was expected")
            }
            Warning::TrailingBytes(n) => write!(f, "{n} trailing bytes after the last frame"),
        }
    }
}

impl Animation {
    /// Decode an animation.
    ///
    /// Unknown tags, unknown enumeration values and truncated data are
    /// errors. Trailing bytes are reported as a warning.
    pub fn read(data: &[u8]) -> Result<(Self, Vec<Warning>)> {
        let mut reader = BinaryReader::new(data);
        let frame_count = reader.read_u16()? as usize;

        let image_count = reader.read_u16()? as usize;
        let mut images = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            images.push(String::from_utf8_lossy(reader.read_prefixed_bytes()?).into_owned());
        }

        let overall = read_items(&mut reader)?;

        let mut frames = Vec::with_capacity(frame_count.min(reader.remaining()));
        for _ in 0..frame_count {
            frames.push(read_frame(&mut reader, images.len())?);
        }

        let mut warnings = Vec::new();
        if !reader.is_empty() {
            warnings.push(Warning::TrailingBytes(reader.remaining()));
        }

        Ok((
            Self {
                images,
                overall,
                frames,
            },
            warnings,
        ))
    }

    /// Encode the animation.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.write_u16::<LittleEndian>(count(self.frames.len(), "frames")?)?;

        out.write_u16::<LittleEndian>(count(self.images.len(), "images")?)?;
        for image in &self.images {
            write_prefixed(&mut out, image)?;
        }

        write_items(&mut out, &self.overall)?;

        for frame in &self.frames {
            out.write_u16::<LittleEndian>(count(frame.boxes.len(), "boxes")?)?;
            for b in &frame.boxes {
                out.write_u16::<LittleEndian>(b.tag)?;
                for v in b.bounds {
                    out.write_i32::<LittleEndian>(v)?;
                }
            }

            let image = match frame.image {
                Some(index) => i16::try_from(index)
                    .map_err(|_| Error::Unrepresentable(format!("image index {index}")))?,
                None => -1,
            };
            out.write_i16::<LittleEndian>(image)?;
            out.write_u16::<LittleEndian>(frame.sub_index)?;
            out.write_i32::<LittleEndian>(frame.pos.0)?;
            out.write_i32::<LittleEndian>(frame.pos.1)?;

            write_items(&mut out, &frame.items)?;
        }

        Ok(out)
    }
}

fn read_frame(reader: &mut BinaryReader<'_>, image_count: usize) -> Result<Frame> {
    let box_count = reader.read_u16()? as usize;
    let mut boxes = Vec::with_capacity(box_count.min(reader.remaining()));
    for _ in 0..box_count {
        let tag = reader.read_u16()?;
        if tag != tag::DAMAGE_BOX && tag != tag::ATTACK_BOX {
            return Err(Error::UnknownTag(tag));
        }
        let mut bounds = [0i32; 6];
        for v in &mut bounds {
            *v = reader.read_i32()?;
        }
        boxes.push(BoxItem { tag, bounds });
    }

    let image_index = reader.read_i16()?;
    let image = match image_index {
        -1 => None,
        i if i >= 0 && (i as usize) < image_count => Some(i as u16),
        i => return Err(Error::InvalidImage(i)),
    };
    let sub_index = reader.read_u16()?;
    let pos = (reader.read_i32()?, reader.read_i32()?);
    let items = read_items(reader)?;

    Ok(Frame {
        boxes,
        image,
        sub_index,
        pos,
        items,
    })
}

fn read_items(reader: &mut BinaryReader<'_>) -> Result<Vec<Item>> {
    let item_count = reader.read_u16()? as usize;
    let mut items = Vec::with_capacity(item_count.min(reader.remaining()));
    for _ in 0..item_count {
        items.push(read_item(reader)?);
    }
    Ok(items)
}

fn read_item(reader: &mut BinaryReader<'_>) -> Result<Item> {
    let tag = reader.read_u16()?;
    let def = tag::by_tag(tag).ok_or(Error::UnknownTag(tag))?;

    let value = match def.payload {
        Payload::Empty => Value::Empty,
        Payload::Byte => Value::Byte(reader.read_u8()?),
        Payload::Short => Value::Short(reader.read_u16()?),
        Payload::Int => Value::Int(reader.read_i32()?),
        Payload::Float => Value::Float(reader.read_f32()?),
        Payload::FloatPair => Value::FloatPair(reader.read_f32()?, reader.read_f32()?),
        Payload::Rgba => Value::Rgba(reader.read_array()?),
        Payload::Effect => {
            let code = reader.read_u16()?;
            if tag::enum_name(tag::EFFECTS, code).is_none() {
                return Err(Error::UnknownEnum { tag, value: code });
            }
            let extra = match code {
                tag::EFFECT_MONOCHROME => EffectExtra::Monochrome(reader.read_array()?),
                tag::EFFECT_SPACE_DISTORT => {
                    EffectExtra::SpaceDistort([reader.read_u16()?, reader.read_u16()?])
                }
                _ => EffectExtra::None,
            };
            Value::Effect { code, extra }
        }
        Payload::Enum(table) => {
            let value = reader.read_u16()?;
            if tag::enum_name(table, value).is_none() {
                return Err(Error::UnknownEnum { tag, value });
            }
            Value::Enum(value)
        }
        Payload::Sound => {
            Value::Sound(String::from_utf8_lossy(reader.read_prefixed_bytes()?).into_owned())
        }
        Payload::Clip => Value::Clip([
            reader.read_i16()?,
            reader.read_i16()?,
            reader.read_i16()?,
            reader.read_i16()?,
        ]),
    };

    Ok(Item { tag, value })
}

fn write_items(out: &mut Vec<u8>, items: &[Item]) -> Result<()> {
    out.write_u16::<LittleEndian>(count(items.len(), "items")?)?;
    for item in items {
        out.write_u16::<LittleEndian>(item.tag)?;
        match &item.value {
            Value::Empty => {}
            Value::Byte(v) => out.write_u8(*v)?,
            Value::Short(v) | Value::Enum(v) => out.write_u16::<LittleEndian>(*v)?,
            Value::Int(v) => out.write_i32::<LittleEndian>(*v)?,
            Value::Float(v) => out.write_f32::<LittleEndian>(*v)?,
            Value::FloatPair(a, b) => {
                out.write_f32::<LittleEndian>(*a)?;
                out.write_f32::<LittleEndian>(*b)?;
            }
            Value::Rgba(rgba) => out.write_all(rgba)?,
            Value::Effect { code, extra } => {
                out.write_u16::<LittleEndian>(*code)?;
                match extra {
                    EffectExtra::None => {}
                    EffectExtra::Monochrome(rgb) => out.write_all(rgb)?,
                    EffectExtra::SpaceDistort(values) => {
                        for v in values {
                            out.write_u16::<LittleEndian>(*v)?;
                        }
                    }
                }
            }
            Value::Sound(path) => write_prefixed(out, path)?,
            Value::Clip(values) => {
                for v in values {
                    out.write_i16::<LittleEndian>(*v)?;
                }
            }
        }
    }
    Ok(())
}

fn write_prefixed(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = i32::try_from(s.len())
        .map_err(|_| Error::Unrepresentable(format!("string of {} bytes", s.len())))?;
    out.write_i32::<LittleEndian>(len)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn count(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::Unrepresentable(format!("{len} {what}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Animation {
        Animation {
            images: vec!["character/swordman/attack.img".into()],
            overall: vec![
                Item { tag: 0, value: Value::Byte(1) },
                Item { tag: 1, value: Value::Byte(1) },
            ],
            frames: vec![Frame {
                boxes: vec![BoxItem {
                    tag: tag::ATTACK_BOX,
                    bounds: [-10, 0, 0, 40, 20, 30],
                }],
                image: Some(0),
                sub_index: 3,
                pos: (-100, -200),
                items: vec![
                    Item { tag: 12, value: Value::Int(80) },
                    Item {
                        tag: tag::GRAPHIC_EFFECT,
                        value: Value::Effect {
                            code: tag::EFFECT_MONOCHROME,
                            extra: EffectExtra::Monochrome([255, 0, 128]),
                        },
                    },
                    Item { tag: 16, value: Value::Sound("R_SWORD".into()) },
                ],
            }],
        }
    }

    #[test]
    fn test_binary_round_trip() {
        let ani = sample();
        let bytes = ani.write().unwrap();
        let (parsed, warnings) = Animation::read(&bytes).unwrap();
        assert_eq!(parsed, ani);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_layout_prefix() {
        let bytes = Animation::default().write().unwrap();
        // frame count, image count, overall count
        assert_eq!(bytes, [0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_trailing_bytes_warn() {
        let mut bytes = sample().write().unwrap();
        bytes.extend_from_slice(&[1, 2, 3]);
        let (_, warnings) = Animation::read(&bytes).unwrap();
        assert_eq!(warnings, vec![Warning::TrailingBytes(3)]);
    }

    #[test]
    fn test_unknown_tag_fails() {
        // No frames, no images, one overall item with tag 2.
        let bytes = [0, 0, 0, 0, 1, 0, 2, 0];
        assert!(matches!(Animation::read(&bytes), Err(Error::UnknownTag(2))));
    }

    #[test]
    fn test_unknown_enum_fails() {
        let bytes = [0, 0, 0, 0, 1, 0, 24, 0, 9, 0];
        assert!(matches!(
            Animation::read(&bytes),
            Err(Error::UnknownEnum { tag: 24, value: 9 })
        ));
    }

    #[test]
    fn test_truncated_fails() {
        let bytes = sample().write().unwrap();
        assert!(Animation::read(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_bad_image_index_fails() {
        let mut ani = sample();
        ani.images.clear();
        let bytes = ani.write().unwrap();
        assert!(matches!(Animation::read(&bytes), Err(Error::InvalidImage(0))));
    }
}
