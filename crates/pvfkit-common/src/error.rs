//! Error types for pvfkit-common.

use thiserror::Error;

/// Common error type for pvfkit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// End of buffer reached while reading.
    #[error("unexpected end of buffer: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// Invalid magic bytes encountered.
    #[error("invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// A length prefix that cannot describe a valid payload.
    #[error("invalid length prefix: {0}")]
    InvalidLength(i64),

    /// Malformed text handed to a compiler.
    #[error("line {line}: {message}")]
    Lex { line: usize, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
