//! Memory entries and write outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::{Fingerprint, SimHash};
use crate::tier::Tier;

/// One unit of agent memory.
///
/// Created on write, owned exclusively by the store, never shared
/// across tiers. Serialized verbatim as a WAL line and as a shard
/// record payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub tier: Tier,
    pub content: String,
    /// Where the write came from (agent, user, system).
    pub source: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Exact content fingerprint.
    pub fingerprint: Fingerprint,
    /// Similarity fingerprint.
    pub simhash: SimHash,
}

impl MemoryEntry {
    /// Build a new entry for `content`, computing both fingerprints.
    pub fn new(
        tier: Tier,
        content: impl Into<String>,
        source: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4().to_string(),
            tier,
            fingerprint: Fingerprint::compute(&content),
            simhash: SimHash::compute(&content),
            content,
            source: source.into(),
            session_id: session_id.into(),
            created_at: Utc::now(),
        }
    }

}

/// Result of a write request.
///
/// Rejections are expected steady-state behavior, so they are reported
/// as distinguishable outcomes rather than errors.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Entry appended to the tier's WAL.
    Stored(MemoryEntry),
    /// An entry with an identical exact fingerprint already exists in
    /// the tier; the write was a no-op.
    DuplicateExact,
    /// An entry within the similarity threshold already exists in the
    /// tier; the write was rejected as redundant.
    NearDuplicate { distance: u32 },
    /// The content matched the noise denylist and never reached the
    /// WAL.
    RejectedNoise,
}

impl WriteOutcome {
    /// Whether the write produced a stored entry.
    pub fn is_stored(&self) -> bool {
        matches!(self, WriteOutcome::Stored(_))
    }
}
