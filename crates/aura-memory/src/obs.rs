//! Structured observability hooks for memory store lifecycle events.
//!
//! Events are emitted at `info!` level through the global `tracing`
//! subscriber (see [`crate::telemetry::init_tracing`]); verbosity is
//! controlled with the `RUST_LOG` environment variable.

use tracing::{info, warn};

use crate::compaction::CompactionOutcome;
use crate::tier::Tier;

/// Emit event: entry appended to a tier's WAL.
pub fn emit_entry_written(tier: Tier, entry_id: &str, elapsed_micros: u128) {
    info!(
        event = "memory.entry_written",
        tier = %tier,
        entry_id = %entry_id,
        elapsed_micros = elapsed_micros,
    );
}

/// Emit event: write resolved to a no-op (dedup or noise).
pub fn emit_write_rejected(tier: Tier, reason: &str) {
    info!(event = "memory.write_rejected", tier = %tier, reason = %reason);
}

/// Emit event: WAL folded into a sealed shard.
pub fn emit_shard_sealed(outcome: &CompactionOutcome) {
    info!(
        event = "memory.shard_sealed",
        tier = %outcome.tier,
        shard_id = %outcome.sealed.shard_id,
        folded = outcome.folded,
        superseded = outcome.superseded,
        size_bytes = outcome.sealed.size_bytes,
    );
}

/// Emit event: shard commit failed; the WAL remains authoritative.
pub fn emit_compaction_failed(tier: Tier, error: &dyn std::fmt::Display) {
    warn!(event = "memory.compaction_failed", tier = %tier, error = %error);
}

/// Emit event: session ended with the given number of sealed shards.
pub fn emit_session_ended(session_id: &str, sealed: usize, pad_cleared: usize) {
    info!(
        event = "memory.session_ended",
        session_id = %session_id,
        sealed = sealed,
        pad_cleared = pad_cleared,
    );
}

/// Emit event: prune removed entries.
pub fn emit_entries_pruned(removed: usize, shards_rewritten: usize) {
    info!(
        event = "memory.entries_pruned",
        removed = removed,
        shards_rewritten = shards_rewritten,
    );
}
