//! Error types for the archive crate.

use thiserror::Error;

/// Errors that can occur when working with PVF archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] pvfkit_common::Error),

    /// A header field failed its sanity bounds.
    #[error("invalid archive header: {0}")]
    InvalidHeader(String),

    /// The decrypted directory does not match its declared checksum.
    #[error("directory checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    DirectoryChecksum { expected: u32, actual: u32 },

    /// A directory record points outside the data section.
    #[error("entry {key} lies outside the archive ({offset} + {len} > {available})")]
    EntryOutOfBounds {
        key: String,
        offset: usize,
        len: usize,
        available: usize,
    },

    /// Cipher input that is not a whole number of 32-bit words.
    #[error("cipher input length {0} is not a multiple of 4")]
    UnalignedLength(usize),

    /// Two directory records normalize to the same key.
    #[error("duplicate entry in directory: {0}")]
    DuplicateKey(String),

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Entry already exists.
    #[error("entry already exists: {0}")]
    EntryExists(String),

    /// Key that normalizes to nothing.
    #[error("invalid entry key: {0:?}")]
    InvalidKey(String),

    /// An unloaded entry was read but the archive has no backing file.
    #[error("source file for entry {0} is not available")]
    SourceUnavailable(String),

    /// The serialized archive does not fit the 32-bit offsets of the format.
    #[error("archive too large: {0} bytes exceeds the 32-bit offset range")]
    OffsetOverflow(usize),
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
