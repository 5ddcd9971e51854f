//! On-disk layout of the `.aura` archive format.
//!
//! ```text
//! [Datapoint 1][Datapoint 2]...[Datapoint N][Index][Footer]
//!
//! Datapoint: [meta_length: 4B uint32 LE][payload_length: 4B uint32 LE]
//!            [metadata bytes][payload bytes]
//! Index:     archive-ordered table of (id, offset, meta_len, payload_len)
//! Footer:    [index_offset: 8B uint64 LE][magic: 4B 'AURA']
//! ```
//!
//! All integers are little-endian. The index is serialized as JSON so it
//! stays inspectable; the framing around it is fixed and byte-exact.

use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

/// Trailing magic marker confirming file validity.
pub const AURA_MAGIC: [u8; 4] = *b"AURA";

/// Footer size: 8-byte index offset plus 4-byte magic.
pub const FOOTER_LEN: u64 = 12;

/// Per-record header size: two 4-byte length fields.
pub const RECORD_HEADER_LEN: u64 = 8;

/// Location and extent of one record within the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub offset: u64,
    pub meta_len: u32,
    pub payload_len: u32,
}

/// Mapping from datapoint identifier to byte location, preserving
/// archive order so iteration follows write order.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    records: Vec<IndexEntry>,
    by_id: HashMap<String, usize>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Fails on a duplicate id.
    pub fn push(&mut self, entry: IndexEntry) -> Result<()> {
        if self.by_id.contains_key(&entry.id) {
            return Err(ArchiveError::DuplicateDatapoint { id: entry.id });
        }
        self.by_id.insert(entry.id.clone(), self.records.len());
        self.records.push(entry);
        Ok(())
    }

    /// O(1) lookup by id.
    pub fn get(&self, id: &str) -> Option<&IndexEntry> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Entries in archive order.
    pub fn records(&self) -> &[IndexEntry] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize to the on-disk index block.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.records)?)
    }

    /// Decode an index block, rebuilding the lookup table.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let records: Vec<IndexEntry> = serde_json::from_slice(bytes)
            .map_err(|e| ArchiveError::CorruptIndex(e.to_string()))?;
        let mut index = Self::new();
        for entry in records {
            index
                .push(entry)
                .map_err(|e| ArchiveError::CorruptIndex(e.to_string()))?;
        }
        Ok(index)
    }
}

/// Read a little-endian u32 from `reader`.
pub(crate) fn read_u32_le(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64 from `reader`.
pub(crate) fn read_u64_le(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
