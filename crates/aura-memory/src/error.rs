//! Error types for the memory store.

use thiserror::Error;

use crate::tier::Tier;

/// Errors produced by memory store operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Shard encoding or decoding failed.
    #[error("archive error: {0}")]
    Archive(#[from] aura_archive::ArchiveError),

    /// Shard commit failed before the durable write completed.
    ///
    /// Retryable: the tier's WAL is left untouched and remains the
    /// source of truth until a later compaction succeeds.
    #[error("compaction failed for /{tier}: {reason}")]
    Compaction { tier: Tier, reason: String },

    /// A shard record did not decode as a memory entry.
    #[error("corrupt shard entry in {shard_id}: {reason}")]
    CorruptShardEntry { shard_id: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for memory store operations.
pub type Result<T> = std::result::Result<T, MemoryError>;
