//! Aura-Memory: Three-Tier Memory OS
//!
//! A cognitively-inspired memory store for AI agents:
//!
//! - `/pad`      - working notepad (transient, fast writes)
//! - `/episodic` - session logs (auto-archived)
//! - `/fact`     - verified knowledge (persistent)
//!
//! Writes land in a per-tier write-ahead log and return immediately;
//! compaction folds the log into sealed `.aura` shards with attached
//! approximate-membership filters. Queries rank WAL and shard entries
//! by lexical match, tier priority, and recency decay.
//!
//! ## Layer 1 - Domain/Memory
//!
//! Focus: write-path dedup, durable compaction, scored retrieval.

pub mod bloom;
pub mod compaction;
mod entry;
mod error;
mod fingerprint;
mod noise;
pub mod obs;
mod score;
mod shard;
mod store;
pub mod telemetry;
mod tier;
pub mod tokens;
mod wal;

pub use bloom::BloomFilter;
pub use compaction::{fold_duplicates, CompactionOutcome};
pub use entry::{MemoryEntry, WriteOutcome};
pub use error::{MemoryError, Result};
pub use fingerprint::{Fingerprint, SimHash};
pub use noise::NoiseFilter;
pub use score::{
    HitOrigin, MemoryHit, MemoryQuery, DEFAULT_HALF_LIFE_DAYS, DEFAULT_QUERY_LIMIT,
};
pub use shard::{discover_shards, SealedShard, ShardInfo};
pub use store::{MemoryConfig, MemoryStore, PruneOptions, SessionSummary};
pub use tier::{Tier, TierUsage, TIERS};
pub use wal::TierWal;

/// Aura Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
