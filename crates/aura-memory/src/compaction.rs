//! Folding a tier's WAL into a sealed shard.
//!
//! State machine per tier: OPEN (accumulating in the WAL) ->
//! COMPACTING -> SEALED (shard written) -> OPEN (fresh WAL). The WAL
//! is truncated strictly after the shard's durable commit, so an
//! interrupted compaction is retryable and loses nothing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::entry::MemoryEntry;
use crate::error::Result;
use crate::obs;
use crate::shard::{shard_dir, SealedShard, ShardInfo};
use crate::tier::Tier;
use crate::wal::TierWal;

/// Result of compacting one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionOutcome {
    pub tier: Tier,
    pub sealed: ShardInfo,
    /// Entries written into the shard.
    pub folded: usize,
    /// WAL entries dropped as superseded duplicates.
    pub superseded: usize,
}

/// Drop entries superseded by a later exact or near duplicate.
///
/// Surviving entries keep their original relative order; on any
/// conflict the later write wins.
pub fn fold_duplicates(
    entries: Vec<MemoryEntry>,
    max_hamming_distance: u32,
) -> (Vec<MemoryEntry>, usize) {
    let mut keep = vec![true; entries.len()];
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let exact = entries[j].fingerprint == entries[i].fingerprint;
            let near = entries[i].simhash.distance(entries[j].simhash) <= max_hamming_distance;
            if exact || near {
                keep[i] = false;
                break;
            }
        }
    }

    let total = entries.len();
    let survivors: Vec<MemoryEntry> = entries
        .into_iter()
        .zip(keep)
        .filter_map(|(e, k)| k.then_some(e))
        .collect();
    let superseded = total - survivors.len();
    (survivors, superseded)
}

/// Compact `wal` into a new sealed shard under `root`.
///
/// Returns `None` when the WAL has nothing to fold. On any failure the
/// WAL is left untouched and the error is retryable.
pub fn compact_tier(
    root: &Path,
    tier: Tier,
    wal: &mut TierWal,
    false_positive_rate: f64,
    max_hamming_distance: u32,
) -> Result<Option<(SealedShard, CompactionOutcome)>> {
    let entries = wal.entries()?;
    if entries.is_empty() {
        return Ok(None);
    }

    let (survivors, superseded) = fold_duplicates(entries, max_hamming_distance);
    if survivors.is_empty() {
        // Every entry superseded; nothing worth sealing, but the WAL
        // can now be dropped safely.
        wal.clear()?;
        return Ok(None);
    }

    let shard = match SealedShard::create(&shard_dir(root, tier), tier, &survivors, false_positive_rate) {
        Ok(shard) => shard,
        Err(e) => {
            obs::emit_compaction_failed(tier, &e);
            return Err(e);
        }
    };

    // Durable commit reached: the WAL stops being the source of truth.
    wal.clear()?;

    let outcome = CompactionOutcome {
        tier,
        sealed: shard.info().clone(),
        folded: survivors.len(),
        superseded,
    };
    obs::emit_shard_sealed(&outcome);
    Ok(Some((shard, outcome)))
}
