//! Tokenizer for the bracketed text projections.
//!
//! Script and animation entries are edited as text made of a few token
//! shapes separated by whitespace:
//!
//! - `[NAME]` - a section or tag name (may contain spaces)
//! - `` `text` `` - a quoted string
//! - `<id::name>` or ``<id::name`display`>`` - a linked reference
//! - `{type=value}` - an explicit record with a string or numeric value
//! - `12`, `-3` - integers
//! - `1.5`, `-0.25` - floats (anything containing a decimal point)
//!
//! Lines whose first non-blank character is `#` are header lines and skipped.

use memchr::memchr;

use crate::{Error, Result};

/// A literal value carried by an explicit `{type=value}` token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f32),
}

/// A single token of the text projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `[NAME]`
    Tag(String),
    /// `` `text` ``
    Str(String),
    /// `<id::name>`; the optional display text is dropped.
    Link { id: u32, name: String },
    /// `{type=value}`
    Explicit { tag: u8, value: Literal },
    /// A bare integer.
    Int(i64),
    /// A bare number containing a decimal point.
    Float(f32),
}

/// A token together with the line it started on (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Tokenize a complete text projection.
pub fn tokenize(text: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Build a lexing error for the given line.
pub fn error(line: usize, message: impl Into<String>) -> Error {
    Error::Lex {
        line,
        message: message.into(),
    }
}

/// Streaming tokenizer over a text projection.
#[derive(Debug)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Create a lexer positioned at the start of `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            at_line_start: true,
        }
    }

    /// Current line number (1-based).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Produce the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Spanned>> {
        self.skip_blank();
        let Some(&first) = self.src.as_bytes().get(self.pos) else {
            return Ok(None);
        };
        let line = self.line;

        let token = match first {
            b'[' => Token::Tag(self.delimited(b']', "section")?.to_string()),
            b'`' => Token::Str(self.delimited(b'`', "string")?.to_string()),
            b'<' => self.link()?,
            b'{' => self.explicit()?,
            _ => {
                let word = self.word();
                parse_number(word).ok_or_else(|| error(line, format!("unexpected token `{word}`")))?
            }
        };

        Ok(Some(Spanned { token, line }))
    }

    /// Skip whitespace and `#` header lines, tracking line numbers.
    fn skip_blank(&mut self) {
        let src = self.src;
        let bytes = src.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                    self.at_line_start = true;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'#' if self.at_line_start => {
                    let rest = &bytes[self.pos..];
                    self.pos += memchr(b'\n', rest).unwrap_or(rest.len());
                }
                _ => {
                    self.at_line_start = false;
                    return;
                }
            }
        }
    }

    /// Consume `open ... close` on a single line and return the inner text.
    fn delimited(&mut self, close: u8, what: &str) -> Result<&'a str> {
        let src = self.src;
        let start = self.pos + 1;
        let rest = &src.as_bytes()[start..];
        let end = memchr(close, rest)
            .ok_or_else(|| error(self.line, format!("unterminated {what}")))?;
        if memchr(b'\n', &rest[..end]).is_some() {
            return Err(error(self.line, format!("{what} spans a line break")));
        }
        self.pos = start + end + 1;
        Ok(&src[start..start + end])
    }

    /// Consume a run of non-whitespace characters.
    fn word(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        let bytes = src.as_bytes();
        while let Some(&b) = bytes.get(self.pos) {
            if b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    /// `<id::name>` or ``<id::name`display`>``.
    fn link(&mut self) -> Result<Token> {
        let line = self.line;
        let body = self.delimited(b'>', "link")?;
        let (id, rest) = body
            .split_once("::")
            .ok_or_else(|| error(line, format!("link `<{body}>` is missing `::`")))?;
        let id = id
            .trim()
            .parse::<u32>()
            .map_err(|_| error(line, format!("invalid link id `{id}`")))?;
        let name = match rest.find('`') {
            Some(tick) => {
                if !rest.ends_with('`') || tick == rest.len() - 1 {
                    return Err(error(line, format!("unterminated link display in `<{body}>`")));
                }
                &rest[..tick]
            }
            None => rest,
        };
        Ok(Token::Link {
            id,
            name: name.to_string(),
        })
    }

    /// `{type=value}` where value is a quoted string or a number.
    fn explicit(&mut self) -> Result<Token> {
        let line = self.line;
        let src = self.src;
        let bytes = src.as_bytes();
        let start = self.pos + 1;
        let eq = memchr(b'=', &bytes[start..])
            .map(|i| start + i)
            .ok_or_else(|| error(line, "explicit record is missing `=`"))?;
        let tag_text = src[start..eq].trim();
        let tag = tag_text
            .parse::<u8>()
            .map_err(|_| error(line, format!("invalid record type `{tag_text}`")))?;

        self.pos = eq + 1;
        let value = if bytes.get(self.pos) == Some(&b'`') {
            Literal::Str(self.delimited(b'`', "string")?.to_string())
        } else {
            let end = memchr(b'}', &bytes[self.pos..])
                .ok_or_else(|| error(line, "unterminated explicit record"))?;
            let text = src[self.pos..self.pos + end].trim();
            self.pos += end;
            match parse_number(text) {
                Some(Token::Int(v)) => Literal::Int(v),
                Some(Token::Float(v)) => Literal::Float(v),
                _ => return Err(error(line, format!("invalid record value `{text}`"))),
            }
        };

        if bytes.get(self.pos) != Some(&b'}') {
            return Err(error(line, "explicit record is missing `}`"));
        }
        self.pos += 1;
        Ok(Token::Explicit { tag, value })
    }
}

/// Parse a bare number: a decimal point makes it a float.
fn parse_number(word: &str) -> Option<Token> {
    let first = *word.as_bytes().first()?;
    if !(first.is_ascii_digit() || matches!(first, b'-' | b'+' | b'.')) {
        return None;
    }
    if word.contains('.') {
        word.parse::<f32>().ok().filter(|v| v.is_finite()).map(Token::Float)
    } else {
        word.parse::<i64>().ok().map(Token::Int)
    }
}
