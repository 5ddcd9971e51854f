//! Query scoring: lexical overlap, tier priority, recency decay.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::MemoryEntry;
use crate::tier::Tier;
use crate::tokens::overlap_score;

/// Default recency half-life: an entry's recency weight halves every
/// 14 days.
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 14.0;

/// Default number of query results.
pub const DEFAULT_QUERY_LIMIT: usize = 5;

/// Query parameters for memory search.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    pub text: String,
    /// Restrict to one tier; all tiers otherwise.
    pub tier: Option<Tier>,
    pub limit: usize,
}

impl MemoryQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tier: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn scoped(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Where a hit was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOrigin {
    /// Still buffered in the tier's WAL.
    Wal,
    /// Read from a sealed shard.
    Shard(String),
}

/// A relevance-scored query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHit {
    pub entry: MemoryEntry,
    pub score: f64,
    pub origin: HitOrigin,
}

/// Recency multiplier: halves every `half_life_days` since creation.
/// Clock skew (entries from the future) is clamped to full weight.
pub fn recency_decay(created_at: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    if half_life_days <= 0.0 {
        return 1.0;
    }
    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;
    (-age_days * std::f64::consts::LN_2 / half_life_days).exp()
}

/// Combined relevance of `entry` for the tokenized query.
///
/// Lexical overlap is the dominant term; the tier bonus orders fact >
/// episodic > pad at equal match strength, and recency decay orders
/// newer entries above older ones within a tier.
pub fn score_entry(
    query_tokens: &HashSet<String>,
    content_tokens: &HashSet<String>,
    entry: &MemoryEntry,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let lexical = overlap_score(query_tokens, content_tokens);
    if lexical == 0.0 {
        return 0.0;
    }
    lexical * entry.tier.score_bonus() * recency_decay(entry.created_at, now, half_life_days)
}

/// Sort hits descending by score, ties broken most-recent first, and
/// truncate to `limit`.
pub fn rank(mut hits: Vec<MemoryHit>, limit: usize) -> Vec<MemoryHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.entry.created_at.cmp(&a.entry.created_at))
    });
    hits.truncate(limit);
    hits
}
