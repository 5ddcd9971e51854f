//! Random-access archive decoder.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::datapoint::{Datapoint, Metadata};
use crate::error::{ArchiveError, Result};
use crate::format::{
    read_u32_le, read_u64_le, ArchiveIndex, IndexEntry, AURA_MAGIC, FOOTER_LEN, RECORD_HEADER_LEN,
};

/// Reads datapoints from an indexed `.aura` archive.
///
/// The footer magic is validated before anything else; the index is
/// decoded once at open time. Every record read seeks to its absolute
/// stored offset, so lookups are O(1) and interleaving random access
/// with iteration is safe. All access is read-only.
#[derive(Debug)]
pub struct ArchiveReader {
    path: PathBuf,
    file: File,
    index: ArchiveIndex,
    file_len: u64,
}

impl ArchiveReader {
    /// Open and validate an archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ArchiveError::ArchiveNotFound(path));
        }
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < FOOTER_LEN {
            return Err(ArchiveError::Truncated {
                context: "footer",
                needed: FOOTER_LEN,
                available: file_len,
            });
        }

        let mut handle = &file;
        handle.seek(SeekFrom::End(-4))?;
        let mut magic = [0u8; 4];
        handle.read_exact(&mut magic)?;
        if magic != AURA_MAGIC {
            return Err(ArchiveError::InvalidMagic { found: magic });
        }

        handle.seek(SeekFrom::End(-(FOOTER_LEN as i64)))?;
        let index_offset = read_u64_le(&mut handle)?;
        let index_end = file_len - FOOTER_LEN;
        if index_offset > index_end {
            return Err(ArchiveError::CorruptIndex(format!(
                "index offset {index_offset} beyond index end {index_end}"
            )));
        }

        handle.seek(SeekFrom::Start(index_offset))?;
        let mut index_bytes = vec![0u8; (index_end - index_offset) as usize];
        handle.read_exact(&mut index_bytes)?;
        let index = ArchiveIndex::from_bytes(&index_bytes)?;

        debug!(
            event = "archive.opened",
            path = %path.display(),
            datapoints = index.len(),
        );

        Ok(Self {
            path,
            file,
            index,
            file_len,
        })
    }

    /// Archive path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total archive size in bytes.
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// The decoded index.
    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Number of datapoints in the archive.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Read a single datapoint by id.
    pub fn read(&self, id: &str) -> Result<Datapoint> {
        let entry = self
            .index
            .get(id)
            .ok_or_else(|| ArchiveError::DatapointNotFound { id: id.to_string() })?;
        self.read_entry(entry)
    }

    /// Read the record described by an index entry.
    pub fn read_entry(&self, entry: &IndexEntry) -> Result<Datapoint> {
        let record_len = RECORD_HEADER_LEN + entry.meta_len as u64 + entry.payload_len as u64;
        if entry.offset + record_len > self.file_len - FOOTER_LEN {
            return Err(ArchiveError::CorruptIndex(format!(
                "record '{}' extends beyond data region",
                entry.id
            )));
        }

        let mut handle = &self.file;
        handle.seek(SeekFrom::Start(entry.offset))?;
        let file_meta_len = read_u32_le(&mut handle)?;
        let file_payload_len = read_u32_le(&mut handle)?;
        if file_meta_len != entry.meta_len || file_payload_len != entry.payload_len {
            return Err(ArchiveError::RecordMismatch {
                id: entry.id.clone(),
                meta_len: entry.meta_len,
                payload_len: entry.payload_len,
                file_meta_len,
                file_payload_len,
            });
        }

        let mut meta_bytes = vec![0u8; entry.meta_len as usize];
        handle.read_exact(&mut meta_bytes)?;
        let metadata: Metadata = serde_json::from_slice(&meta_bytes)?;

        let mut payload = vec![0u8; entry.payload_len as usize];
        handle.read_exact(&mut payload)?;

        Ok(Datapoint {
            id: entry.id.clone(),
            payload,
            metadata,
        })
    }

    /// Iterate datapoints lazily in archive order.
    pub fn iter(&self) -> Records<'_> {
        Records {
            reader: self,
            next: 0,
        }
    }
}

/// Decode an in-memory archive image into its datapoints, in archive
/// order. The counterpart of [`crate::encode`].
pub fn decode(bytes: &[u8]) -> Result<Vec<Datapoint>> {
    let len = bytes.len() as u64;
    if len < FOOTER_LEN {
        return Err(ArchiveError::Truncated {
            context: "footer",
            needed: FOOTER_LEN,
            available: len,
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[bytes.len() - 4..]);
    if magic != AURA_MAGIC {
        return Err(ArchiveError::InvalidMagic { found: magic });
    }

    let footer_start = bytes.len() - FOOTER_LEN as usize;
    let mut cursor = &bytes[footer_start..];
    let index_offset = read_u64_le(&mut cursor)?;
    if index_offset > footer_start as u64 {
        return Err(ArchiveError::CorruptIndex(format!(
            "index offset {index_offset} beyond index end {footer_start}"
        )));
    }
    let index = ArchiveIndex::from_bytes(&bytes[index_offset as usize..footer_start])?;

    index
        .records()
        .iter()
        .map(|entry| {
            let mut cursor = bytes
                .get(entry.offset as usize..)
                .ok_or_else(|| ArchiveError::CorruptIndex(format!(
                    "record '{}' extends beyond data region",
                    entry.id
                )))?;
            let file_meta_len = read_u32_le(&mut cursor)?;
            let file_payload_len = read_u32_le(&mut cursor)?;
            if file_meta_len != entry.meta_len || file_payload_len != entry.payload_len {
                return Err(ArchiveError::RecordMismatch {
                    id: entry.id.clone(),
                    meta_len: entry.meta_len,
                    payload_len: entry.payload_len,
                    file_meta_len,
                    file_payload_len,
                });
            }
            let meta_end = entry.meta_len as usize;
            let payload_end = meta_end + entry.payload_len as usize;
            let record = cursor
                .get(..payload_end)
                .ok_or_else(|| ArchiveError::Truncated {
                    context: "record",
                    needed: entry.offset + RECORD_HEADER_LEN + payload_end as u64,
                    available: len,
                })?;
            let metadata: Metadata = serde_json::from_slice(&record[..meta_end])?;
            Ok(Datapoint {
                id: entry.id.clone(),
                payload: record[meta_end..payload_end].to_vec(),
                metadata,
            })
        })
        .collect()
}

/// Lazy iterator over archive records; each item is read on demand.
pub struct Records<'a> {
    reader: &'a ArchiveReader,
    next: usize,
}

impl Iterator for Records<'_> {
    type Item = Result<Datapoint>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.reader.index.records().get(self.next)?;
        self.next += 1;
        Some(self.reader.read_entry(entry))
    }
}
