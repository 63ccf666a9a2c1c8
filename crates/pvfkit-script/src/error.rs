//! Error types for script bytecode and string tables.

use thiserror::Error;

/// Errors that can occur when compiling or decompiling scripts.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error, including malformed script text.
    #[error("{0}")]
    Common(#[from] pvfkit_common::Error),

    /// The string table binary is inconsistent.
    #[error("invalid string table: {0}")]
    InvalidStringTable(String),

    /// Not a script bytecode buffer.
    #[error("invalid script bytecode: {0}")]
    InvalidScript(String),

    /// A record tag with no entry in the tag table.
    #[error("unknown script tag {0}")]
    UnknownTag(u8),

    /// A string that the text form cannot quote.
    #[error("string cannot be represented in script text: {0:?}")]
    UnrepresentableString(String),

    /// Well-formed tokens that do not make a valid record.
    #[error("line {line}: {message}")]
    Compile { line: usize, message: String },
}

/// Result type for script operations.
pub type Result<T> = std::result::Result<T, Error>;
