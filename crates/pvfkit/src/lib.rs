//! pvfkit - read, edit and write PVF game-asset archives.
//!
//! This crate ties the pvfkit library ecosystem together behind [`Pvf`], a
//! key-addressed view over an archive that presents scripts, animations and
//! the string table as editable text.
//!
//! # Crates
//!
//! - [`pvfkit_common`] - Binary reading, checksums, text lexing
//! - [`pvfkit_archive`] - The encrypted container and its directory
//! - [`pvfkit_script`] - Script bytecode, string table and link table
//! - [`pvfkit_ani`] - Animation bytecode
//!
//! # Example
//!
//! ```no_run
//! use pvfkit::prelude::*;
//!
//! let mut pvf = Pvf::open("Script.pvf")?;
//!
//! let text = pvf.read_file_bytes("equipment/weapon/sword.equ")?;
//! println!("{}", String::from_utf8_lossy(&text));
//!
//! pvf.write_file_bytes("equipment/weapon/sword.equ", &text)?;
//! pvf.save("Script.pvf")?;
//! # Ok::<(), pvfkit::Error>(())
//! ```

mod error;
mod kind;
mod model;

pub use error::{Error, Result};
pub use kind::EntryKind;
pub use model::Pvf;

// Re-export all sub-crates
pub use pvfkit_ani as ani;
pub use pvfkit_archive as archive;
pub use pvfkit_common as common;
pub use pvfkit_script as script;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{EntryKind, Pvf};
    pub use pvfkit_ani::{Animation, Warning};
    pub use pvfkit_archive::{normalize_key, EntryInfo, PvfArchive};
    pub use pvfkit_common::{crc, BinaryReader};
    pub use pvfkit_script::{LinkTable, StringTable};
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
