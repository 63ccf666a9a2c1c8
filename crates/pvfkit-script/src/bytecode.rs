//! Binary form of a compiled script.
//!
//! ```text
//! [0xB0 0xD0][tag:u8 value:u32] ...
//! ```

use pvfkit_common::BinaryReader;

use crate::{Error, Result};

/// Leading bytes of every compiled script.
pub const MARKER: [u8; 2] = [0xB0, 0xD0];

/// Size of one encoded record.
pub const RECORD_LEN: usize = 5;

/// One tagged bytecode record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    pub tag: u8,
    pub value: u32,
}

impl Record {
    pub const fn new(tag: u8, value: u32) -> Self {
        Self { tag, value }
    }
}

/// Check if a buffer is compiled script bytecode.
pub fn is_script(data: &[u8]) -> bool {
    data.starts_with(&MARKER) && (data.len() - MARKER.len()) % RECORD_LEN == 0
}

/// Decode the records of a compiled script.
pub fn read_records(data: &[u8]) -> Result<Vec<Record>> {
    if !is_script(data) {
        return Err(Error::InvalidScript(format!(
            "{} bytes without a record-aligned marker",
            data.len()
        )));
    }

    let mut reader = BinaryReader::new(data);
    reader.expect_magic(&MARKER)?;
    let mut records = Vec::with_capacity(reader.remaining() / RECORD_LEN);
    while !reader.is_empty() {
        let tag = reader.read_u8()?;
        let value = reader.read_u32()?;
        records.push(Record { tag, value });
    }
    Ok(records)
}

/// Encode records into a compiled script.
pub fn write_records(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MARKER.len() + records.len() * RECORD_LEN);
    out.extend_from_slice(&MARKER);
    for record in records {
        out.push(record.tag);
        out.extend_from_slice(&record.value.to_le_bytes());
    }
    out
}
