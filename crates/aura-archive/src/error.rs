//! Error types for the archive codec and loader.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by archive encoding, decoding, and retrieval.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The trailing magic marker did not match `AURA`.
    #[error("invalid archive: magic bytes mismatch (got {found:?})")]
    InvalidMagic { found: [u8; 4] },

    /// The file is too short to hold the structure being read.
    #[error("truncated archive: needed {needed} bytes for {context}, have {available}")]
    Truncated {
        context: &'static str,
        needed: u64,
        available: u64,
    },

    /// The index could not be decoded or points outside the file.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A record's on-disk length fields disagree with the index.
    #[error("record mismatch for '{id}': index says ({meta_len}, {payload_len}), file says ({file_meta_len}, {file_payload_len})")]
    RecordMismatch {
        id: String,
        meta_len: u32,
        payload_len: u32,
        file_meta_len: u32,
        file_payload_len: u32,
    },

    /// Archive file does not exist.
    #[error("archive not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// Identifier absent from the index.
    #[error("datapoint not found: {id}")]
    DatapointNotFound { id: String },

    /// A datapoint id was appended twice to the same writer.
    #[error("duplicate datapoint id: {id}")]
    DuplicateDatapoint { id: String },

    /// Payload bytes requested as text were not valid UTF-8.
    #[error("payload for '{id}' is not valid UTF-8 text")]
    PayloadNotText { id: String },

    /// Operation on a loader whose handle was already released.
    #[error("archive handle is closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
