//! Error types for the archive model.

use thiserror::Error;

/// Errors that can occur when working with a [`crate::Pvf`].
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on an external file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive container error.
    #[error("{0}")]
    Archive(#[from] pvfkit_archive::Error),

    /// Script or string table error.
    #[error("{0}")]
    Script(#[from] pvfkit_script::Error),

    /// Animation error.
    #[error("{0}")]
    Animation(#[from] pvfkit_ani::Error),

    /// A replacement string table moves a string that compiled scripts
    /// already reference.
    #[error("replacement string table changes string {index} ({string:?}) referenced by unsaved scripts")]
    StringTableConflict { index: u32, string: String },
}

/// Result type for archive model operations.
pub type Result<T> = std::result::Result<T, Error>;
