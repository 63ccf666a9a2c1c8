//! Error types for animation entries.

use thiserror::Error;

/// Errors that can occur when compiling or decompiling animations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error, including truncated data and malformed text.
    #[error("{0}")]
    Common(#[from] pvfkit_common::Error),

    /// An item or box tag with no entry in the tag table.
    #[error("unknown animation tag {0}")]
    UnknownTag(u16),

    /// An enumerated value outside its table.
    #[error("unknown value {value} for animation tag {tag}")]
    UnknownEnum { tag: u16, value: u16 },

    /// A frame refers to an image that is not in the image table.
    #[error("image index {0} out of range")]
    InvalidImage(i16),

    /// A value that the text form cannot express.
    #[error("value cannot be represented in animation text: {0}")]
    Unrepresentable(String),

    /// Well-formed tokens that do not make a valid animation.
    #[error("line {line}: {message}")]
    Compile { line: usize, message: String },
}

/// Result type for animation operations.
pub type Result<T> = std::result::Result<T, Error>;
