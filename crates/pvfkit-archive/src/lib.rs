//! PVF archive container.
//!
//! A PVF archive is a single file holding a directory of named entries:
//!
//! - an opaque GUID and a format version, passed through unchanged
//! - an encrypted directory protected by a checksum
//! - one encrypted block per entry, zero-padded to 4 bytes
//!
//! Entries are decrypted lazily on first read. Saving re-encrypts only the
//! entries that were written; everything else is copied byte for byte.
//!
//! # Example
//!
//! ```no_run
//! use pvfkit_archive::PvfArchive;
//!
//! let mut archive = PvfArchive::open("Script.pvf")?;
//!
//! for info in archive.entry_infos() {
//!     println!("{}: {} bytes", info.key, info.data_len);
//! }
//!
//! let data = archive.read("etc/randomoption.lst")?.to_vec();
//! archive.write("etc/randomoption.lst", &data)?;
//! archive.save("Script.pvf")?;
//! # Ok::<(), pvfkit_archive::Error>(())
//! ```

mod archive;
mod entry;
mod error;
mod header;

pub mod crypto;

pub use archive::{key_path, normalize_key, PvfArchive, DEFAULT_FORMAT_VERSION, TRAILER};
pub use entry::{block_len, Entry, EntryInfo};
pub use error::{Error, Result};
pub use header::{DirectoryRecord, DirectoryRecordTail, PvfHeader};
