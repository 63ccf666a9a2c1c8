//! Common utilities for pvfkit.
//!
//! This crate provides foundational types and utilities used across all pvfkit crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`crc`] - The reflected CRC-32 checksum that protects archive entries
//! - [`lex`] - The tokenizer shared by the script and animation compilers

mod error;
mod reader;

pub mod crc;
pub mod lex;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Header line that opens every text projection.
pub const TEXT_HEADER: &str = "#PVF_File";
