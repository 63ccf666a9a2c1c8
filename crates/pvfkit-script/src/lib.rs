//! Script bytecode for PVF archives.
//!
//! Most text-like entries in an archive are stored as compiled scripts: a
//! marker followed by 5-byte tagged records whose strings live in a shared
//! [`StringTable`]. This crate converts between that form and an editable
//! text form:
//!
//! ```text
//! #PVF_File
//!
//! [name]
//!     `Short Sword`
//!
//! [attack]
//!     10    -20    1.5    <3::item_desc>
//! ```
//!
//! # Example
//!
//! ```
//! use pvfkit_script::{compile, decompile, StringTable};
//!
//! let mut strings = StringTable::new();
//! let bytes = compile("[name]\n`Short Sword`", &mut strings)?;
//! let text = decompile(&bytes, &strings, None)?;
//! assert!(text.contains("`Short Sword`"));
//! # Ok::<(), pvfkit_script::Error>(())
//! ```

mod error;

pub mod bytecode;
pub mod compiler;
pub mod decompiler;
pub mod link;
pub mod string_table;
pub mod tag;

pub use bytecode::{is_script, Record};
pub use compiler::compile;
pub use decompiler::decompile;
pub use error::{Error, Result};
pub use link::{LinkTable, LINK_LIST_KEY};
pub use string_table::{StringTable, STRING_TABLE_KEY};
