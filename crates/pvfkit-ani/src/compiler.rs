//! Animation text to binary.

use std::iter::Peekable;
use std::vec::IntoIter;

use pvfkit_common::lex::{self, Spanned, Token};

use crate::model::{Animation, BoxItem, EffectExtra, Frame, Item, Value, Warning};
use crate::tag::{self, Payload};
use crate::{Error, Result};

/// Binary produced from animation text.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub data: Vec<u8>,
    pub warnings: Vec<Warning>,
}

/// Compile animation text into its binary form.
///
/// Frame numbering and `[FRAME MAX]` mismatches do not fail compilation;
/// they are returned as warnings and the frame blocks present are written.
pub fn compile(text: &str) -> Result<Compiled> {
    let (animation, warnings) = parse(text)?;
    for warning in &warnings {
        tracing::warn!(%warning, "animation compiled with warnings");
    }
    Ok(Compiled {
        data: animation.write()?,
        warnings,
    })
}

/// Parse animation text into the data model.
pub fn parse(text: &str) -> Result<(Animation, Vec<Warning>)> {
    let mut parser = Parser {
        tokens: lex::tokenize(text)?.into_iter().peekable(),
        line: 1,
    };
    parser.animation()
}

/// A frame block under construction.
struct FrameBuilder {
    line: usize,
    frame: Frame,
    has_image: bool,
    has_pos: bool,
}

struct Parser {
    tokens: Peekable<IntoIter<Spanned>>,
    line: usize,
}

impl Parser {
    fn animation(&mut self) -> Result<(Animation, Vec<Warning>)> {
        let mut animation = Animation::default();
        let mut warnings = Vec::new();
        let mut declared = None;
        let mut current: Option<FrameBuilder> = None;

        while let Some(Spanned { token, line }) = self.tokens.next() {
            self.line = line;
            let name = match token {
                Token::Tag(name) => name,
                other => return Err(self.error(format!("expected a [TAG], found {other:?}"))),
            };

            if name == "FRAME MAX" {
                declared = Some(self.int(0, u32::MAX as i64)? as u32);
            } else if let Some(index) = frame_index(&name) {
                if let Some(done) = current.take() {
                    animation.frames.push(finish_frame(done)?);
                }
                let expected = animation.frames.len();
                if index as usize != expected {
                    warnings.push(Warning::FrameIndex {
                        expected,
                        found: index,
                    });
                }
                current = Some(FrameBuilder {
                    line,
                    frame: Frame::default(),
                    has_image: false,
                    has_pos: false,
                });
            } else if let Some(builder) = current.as_mut() {
                self.frame_field(&name, builder, &mut animation.images)?;
            } else {
                let item = self.item(&name)?;
                animation.overall.push(item);
            }
        }

        if let Some(done) = current.take() {
            animation.frames.push(finish_frame(done)?);
        }

        if let Some(declared) = declared {
            if declared as usize != animation.frames.len() {
                warnings.push(Warning::FrameCount {
                    declared,
                    actual: animation.frames.len(),
                });
            }
        }

        Ok((animation, warnings))
    }

    fn frame_field(&mut self, name: &str, builder: &mut FrameBuilder, images: &mut Vec<String>) -> Result<()> {
        match name {
            "IMAGE" => {
                let path = self.string()?;
                builder.frame.image = if path.is_empty() {
                    None
                } else {
                    Some(intern_image(images, path).map_err(|e| self.error(e))?)
                };
                builder.frame.sub_index = self.int(0, u16::MAX as i64)? as u16;
                builder.has_image = true;
            }
            "IMAGE POS" => {
                builder.frame.pos = (self.i32()?, self.i32()?);
                builder.has_pos = true;
            }
            _ => {
                if let Some(tag) = tag::enum_value(tag::BOXES, name) {
                    let mut bounds = [0i32; 6];
                    for v in &mut bounds {
                        *v = self.i32()?;
                    }
                    builder.frame.boxes.push(BoxItem { tag, bounds });
                } else {
                    let item = self.item(name)?;
                    builder.frame.items.push(item);
                }
            }
        }
        Ok(())
    }

    fn item(&mut self, name: &str) -> Result<Item> {
        let def = tag::by_name(name).ok_or_else(|| self.error(format!("unknown tag [{name}]")))?;

        let value = match def.payload {
            Payload::Empty => Value::Empty,
            Payload::Byte => Value::Byte(self.int(0, u8::MAX as i64)? as u8),
            Payload::Short => Value::Short(self.int(0, u16::MAX as i64)? as u16),
            Payload::Int => Value::Int(self.i32()?),
            Payload::Float => Value::Float(self.float()?),
            Payload::FloatPair => Value::FloatPair(self.float()?, self.float()?),
            Payload::Rgba => {
                let mut rgba = [0u8; 4];
                for v in &mut rgba {
                    *v = self.int(0, u8::MAX as i64)? as u8;
                }
                Value::Rgba(rgba)
            }
            Payload::Effect => {
                let code = self.enumerated(tag::EFFECTS)?;
                let extra = match code {
                    tag::EFFECT_MONOCHROME => {
                        let mut rgb = [0u8; 3];
                        for v in &mut rgb {
                            *v = self.int(0, u8::MAX as i64)? as u8;
                        }
                        EffectExtra::Monochrome(rgb)
                    }
                    tag::EFFECT_SPACE_DISTORT => EffectExtra::SpaceDistort([
                        self.int(0, u16::MAX as i64)? as u16,
                        self.int(0, u16::MAX as i64)? as u16,
                    ]),
                    _ => EffectExtra::None,
                };
                Value::Effect { code, extra }
            }
            Payload::Enum(table) => Value::Enum(self.enumerated(table)?),
            Payload::Sound => Value::Sound(self.string()?),
            Payload::Clip => {
                let mut clip = [0i16; 4];
                for v in &mut clip {
                    *v = self.int(i16::MIN as i64, i16::MAX as i64)? as i16;
                }
                Value::Clip(clip)
            }
        };

        Ok(Item { tag: def.tag, value })
    }

    fn next(&mut self, what: &str) -> Result<Token> {
        match self.tokens.next() {
            Some(Spanned { token, line }) => {
                self.line = line;
                Ok(token)
            }
            None => Err(self.error(format!("expected {what}, found end of input"))),
        }
    }

    fn int(&mut self, min: i64, max: i64) -> Result<i64> {
        match self.next("an integer")? {
            Token::Int(v) if (min..=max).contains(&v) => Ok(v),
            Token::Int(v) => Err(self.error(format!("{v} is outside {min}..={max}"))),
            other => Err(self.error(format!("expected an integer, found {other:?}"))),
        }
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.int(i32::MIN as i64, i32::MAX as i64)? as i32)
    }

    fn float(&mut self) -> Result<f32> {
        match self.next("a number")? {
            Token::Float(v) => Ok(v),
            Token::Int(v) => Ok(v as f32),
            other => Err(self.error(format!("expected a number, found {other:?}"))),
        }
    }

    fn string(&mut self) -> Result<String> {
        match self.next("a `string`")? {
            Token::Str(s) => Ok(s),
            other => Err(self.error(format!("expected a `string`, found {other:?}"))),
        }
    }

    fn enumerated(&mut self, table: &[(u16, &str)]) -> Result<u16> {
        let name = self.string()?;
        tag::enum_value(table, &name).ok_or_else(|| self.error(format!("unknown value `{name}`")))
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Compile {
            line: self.line,
            message: message.into(),
        }
    }
}

/// `FRAME012` -> 12
fn frame_index(name: &str) -> Option<u32> {
    let digits = name.strip_prefix("FRAME")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn intern_image(images: &mut Vec<String>, path: String) -> std::result::Result<u16, String> {
    if let Some(index) = images.iter().position(|p| *p == path) {
        return Ok(index as u16);
    }
    let index = images.len();
    if index > i16::MAX as usize {
        return Err(format!("too many images ({index})"));
    }
    images.push(path);
    Ok(index as u16)
}

fn finish_frame(builder: FrameBuilder) -> Result<Frame> {
    let missing = match (builder.has_image, builder.has_pos) {
        (false, _) => Some("[IMAGE]"),
        (_, false) => Some("[IMAGE POS]"),
        _ => None,
    };
    if let Some(missing) = missing {
        return Err(Error::Compile {
            line: builder.line,
            message: format!("frame is missing {missing}"),
        });
    }
    Ok(builder.frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompiler::{decompile, to_text};

    const SAMPLE: &str = "#PVF_File

[LOOP]
\t1

[SHADOW]
\t1

[FRAME MAX]
\t2

[FRAME000]
\t[ATTACK BOX]
\t\t-10\t0\t0\t40\t20\t30
\t[IMAGE]
\t\t`character/swordman/attack.img`
\t\t0
\t[IMAGE POS]
\t\t-100\t-200
\t[DELAY]
\t\t80
\t[IMAGE RATE]
\t\t1.25\t0.50
\t[RGBA]
\t\t255\t255\t255\t128
\t[GRAPHIC EFFECT]
\t\t`MONOCHROME`\t255\t0\t0

[FRAME001]
\t[IMAGE]
\t\t`character/swordman/attack.img`
\t\t1
\t[IMAGE POS]
\t\t-100\t-200
\t[DAMAGE TYPE]
\t\t`SUPERARMOR`
\t[PLAY SOUND]
\t\t`R_SWORD_SWING`
\t[CLIP]
\t\t-1\t2\t-3\t4
\t[LOOP START]
";

    #[test]
    fn test_round_trip() {
        let compiled = compile(SAMPLE).unwrap();
        assert!(compiled.warnings.is_empty());

        let decompiled = decompile(&compiled.data).unwrap();
        assert!(decompiled.warnings.is_empty());
        assert_eq!(decompiled.text, SAMPLE);
    }

    #[test]
    fn test_floats_keep_two_decimals() {
        let text = "[FRAME000]\n[IMAGE]\n``\n0\n[IMAGE POS]\n0\t0\n[IMAGE ROTATE]\n33.333\n";
        let compiled = compile(text).unwrap();
        let decompiled = decompile(&compiled.data).unwrap();
        assert!(decompiled.text.contains("\t[IMAGE ROTATE]\n\t\t33.33\n"));

        let (animation, _) = parse(&decompiled.text).unwrap();
        match &animation.frames[0].items[0].value {
            Value::Float(v) => assert!((v - 33.333).abs() < 0.01),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_images_are_shared() {
        let (animation, _) = parse(SAMPLE).unwrap();
        assert_eq!(animation.images, vec!["character/swordman/attack.img"]);
        assert_eq!(animation.frames[0].image, Some(0));
        assert_eq!(animation.frames[1].image, Some(0));
        assert_eq!(animation.frames[1].sub_index, 1);
    }

    #[test]
    fn test_frame_max_mismatch_warns() {
        let text = "[FRAME MAX]\n2\n[FRAME000]\n[IMAGE]\n`a.img`\n0\n[IMAGE POS]\n0\t0\n";
        let compiled = compile(text).unwrap();
        assert_eq!(
            compiled.warnings,
            vec![Warning::FrameCount {
                declared: 2,
                actual: 1
            }]
        );

        let decompiled = decompile(&compiled.data).unwrap();
        assert!(decompiled.text.contains("[FRAME MAX]\n\t1\n"));
        assert!(decompiled.text.contains("[FRAME000]"));
        assert!(!decompiled.text.contains("[FRAME001]"));
    }

    #[test]
    fn test_frame_sequence_warns() {
        let frame = "[IMAGE]\n``\n0\n[IMAGE POS]\n0\t0\n";
        let text = format!("[FRAME000]\n{frame}[FRAME000]\n{frame}[FRAME005]\n{frame}");
        let (animation, warnings) = parse(&text).unwrap();
        assert_eq!(animation.frames.len(), 3);
        assert_eq!(
            warnings,
            vec![
                Warning::FrameIndex {
                    expected: 1,
                    found: 0
                },
                Warning::FrameIndex {
                    expected: 2,
                    found: 5
                },
            ]
        );
    }

    #[test]
    fn test_missing_image_fails() {
        assert!(matches!(
            compile("[FRAME000]\n[IMAGE POS]\n0\t0\n"),
            Err(Error::Compile { line: 1, .. })
        ));
        assert!(compile("[FRAME000]\n[IMAGE]\n``\n0\n").is_err());
    }

    #[test]
    fn test_unknown_tag_fails() {
        assert!(compile("[WOBBLE]\n1\n").is_err());
        assert!(compile("[FLIP TYPE]\n`SIDEWAYS`\n").is_err());
        assert!(compile("[LOOP]\n300\n").is_err());
    }

    #[test]
    fn test_empty_animation() {
        let compiled = compile("#PVF_File\n").unwrap();
        assert_eq!(compiled.data, [0, 0, 0, 0, 0, 0]);
        assert_eq!(to_text(&Animation::default()).unwrap(), "#PVF_File\n\n[FRAME MAX]\n\t0\n");
    }
}
