//! The three-tier memory store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use crate::compaction::{compact_tier, CompactionOutcome};
use crate::entry::{MemoryEntry, WriteOutcome};
use crate::error::Result;
use crate::fingerprint::{Fingerprint, SimHash};
use crate::noise::NoiseFilter;
use crate::obs;
use crate::score::{rank, score_entry, HitOrigin, MemoryHit, MemoryQuery, DEFAULT_HALF_LIFE_DAYS};
use crate::shard::{discover_shards, SealedShard, ShardInfo};
use crate::tier::{Tier, TierUsage, TIERS};
use crate::tokens::tokenize_to_set;
use crate::wal::TierWal;

/// Tuning knobs for a memory store.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Recency half-life used in query ranking, in days.
    pub half_life_days: f64,
    /// Maximum simhash hamming distance treated as a near-duplicate.
    pub max_hamming_distance: u32,
    /// Target false-positive rate for shard filters.
    pub false_positive_rate: f64,
    /// Compact a tier's WAL inline once it buffers this many entries.
    /// `None` disables the threshold; `end_session` still compacts.
    pub wal_flush_threshold: Option<usize>,
    /// Whether the noise denylist screens writes.
    pub noise_filtering: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            half_life_days: DEFAULT_HALF_LIFE_DAYS,
            max_hamming_distance: 3,
            false_positive_rate: 0.01,
            wal_flush_threshold: Some(100),
            noise_filtering: true,
        }
    }
}

/// What `end_session` did.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    /// Shards sealed from the episodic and fact WALs.
    pub sealed: Vec<ShardInfo>,
    /// Pad entries dropped under the transient lifecycle rule.
    pub pad_cleared: usize,
}

/// Options for [`MemoryStore::prune`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOptions {
    /// Allow pruning the fact tier, which is protected by default.
    pub include_facts: bool,
}

/// Three-tier memory store backed by per-tier WALs and sealed shards.
///
/// One store instance exclusively owns its root directory; pointing a
/// second live instance at the same root is unsupported. Writes append
/// to the WAL and return immediately; compaction runs as a distinct
/// phase, never concurrently with writes to the same tier.
pub struct MemoryStore {
    root: PathBuf,
    session_id: String,
    config: MemoryConfig,
    noise: NoiseFilter,
    wals: BTreeMap<Tier, TierWal>,
    shards: BTreeMap<Tier, Vec<SealedShard>>,
}

impl MemoryStore {
    /// Open a store rooted at `root` with default configuration.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(root, MemoryConfig::default())
    }

    /// Open a store with explicit configuration, recovering any WAL
    /// entries and sealed shards already on disk.
    pub fn open_with_config(root: impl AsRef<Path>, config: MemoryConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let mut wals = BTreeMap::new();
        let mut shards = BTreeMap::new();
        for tier in TIERS {
            wals.insert(tier, TierWal::open(&root, tier)?);
            shards.insert(
                tier,
                discover_shards(&root, tier, config.false_positive_rate)?,
            );
        }

        let session_id = Utc::now().format("session_%Y%m%d_%H%M%S").to_string();
        debug!(
            event = "memory.store_opened",
            root = %root.display(),
            session_id = %session_id,
        );

        Ok(Self {
            root,
            session_id,
            config,
            noise: NoiseFilter::new(),
            wals,
            shards,
        })
    }

    /// Replace the noise denylist.
    pub fn with_noise_filter(mut self, filter: NoiseFilter) -> Self {
        self.noise = filter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Write an entry attributed to the agent.
    pub fn write(&mut self, tier: Tier, content: &str) -> Result<WriteOutcome> {
        self.write_from(tier, content, "agent")
    }

    /// Write an entry with an explicit source tag.
    ///
    /// The write path screens noise, deduplicates against the tier's
    /// WAL and shards, then appends to the WAL and returns without
    /// waiting for compaction.
    pub fn write_from(&mut self, tier: Tier, content: &str, source: &str) -> Result<WriteOutcome> {
        let started = Instant::now();

        if self.config.noise_filtering && self.noise.is_noise(content) {
            obs::emit_write_rejected(tier, "noise");
            return Ok(WriteOutcome::RejectedNoise);
        }

        let fingerprint = Fingerprint::compute(content);
        let simhash = SimHash::compute(content);
        if let Some(outcome) = self.detect_duplicate(tier, &fingerprint, simhash)? {
            return Ok(outcome);
        }

        let entry = MemoryEntry::new(tier, content, source, self.session_id.clone());
        let wal = self.wals.get_mut(&tier).expect("wal exists for every tier");
        wal.append(&entry)?;
        obs::emit_entry_written(tier, &entry.id, started.elapsed().as_micros());

        if let Some(threshold) = self.config.wal_flush_threshold {
            if self.wals[&tier].len() >= threshold {
                debug!(event = "memory.wal_threshold_reached", tier = %tier);
                // The entry is already durable in the WAL; a failed
                // flush is retried at the next trigger.
                if let Err(e) = self.compact(tier) {
                    warn!(event = "memory.auto_flush_failed", tier = %tier, error = %e);
                }
            }
        }

        Ok(WriteOutcome::Stored(entry))
    }

    /// Scan one tier for an exact or near duplicate of the candidate
    /// fingerprints. The shard filter answer is cross-checked against
    /// the actual scan: a present key the filter denied means the
    /// filter is broken.
    fn detect_duplicate(
        &self,
        tier: Tier,
        fingerprint: &Fingerprint,
        simhash: SimHash,
    ) -> Result<Option<WriteOutcome>> {
        let mut nearest: Option<u32> = None;

        let mut consider = |entry: &MemoryEntry| -> bool {
            if entry.fingerprint == *fingerprint {
                return true;
            }
            let distance = entry.simhash.distance(simhash);
            if distance <= self.config.max_hamming_distance
                && nearest.map(|d| distance < d).unwrap_or(true)
            {
                nearest = Some(distance);
            }
            false
        };

        for entry in &self.wals[&tier].entries()? {
            if consider(entry) {
                obs::emit_write_rejected(tier, "duplicate_exact");
                return Ok(Some(WriteOutcome::DuplicateExact));
            }
        }

        for shard in &self.shards[&tier] {
            let exact_possible = shard.may_contain(fingerprint);
            for entry in shard.entries()? {
                if consider(entry) {
                    if !exact_possible {
                        // A filter miss for a present key would be a
                        // broken filter; surface it loudly.
                        warn!(event = "memory.filter_false_negative", shard_id = %shard.id());
                    }
                    obs::emit_write_rejected(tier, "duplicate_exact");
                    return Ok(Some(WriteOutcome::DuplicateExact));
                }
            }
        }

        if let Some(distance) = nearest {
            obs::emit_write_rejected(tier, "near_duplicate");
            return Ok(Some(WriteOutcome::NearDuplicate { distance }));
        }
        Ok(None)
    }

    /// Search memory, ranking by lexical match, tier priority, and
    /// recency. Shards that cannot contain any query token are skipped
    /// without being read.
    pub fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryHit>> {
        let query_tokens = tokenize_to_set(&query.text);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let mut hits = Vec::new();

        for tier in TIERS {
            if query.tier.map(|t| t != tier).unwrap_or(false) {
                continue;
            }

            for entry in self.wals[&tier].entries()? {
                let content_tokens = tokenize_to_set(&entry.content);
                let score = score_entry(
                    &query_tokens,
                    &content_tokens,
                    &entry,
                    now,
                    self.config.half_life_days,
                );
                if score > 0.0 {
                    hits.push(MemoryHit {
                        entry,
                        score,
                        origin: HitOrigin::Wal,
                    });
                }
            }

            for shard in &self.shards[&tier] {
                if !shard.may_match_tokens(&query_tokens) {
                    debug!(event = "memory.shard_skipped", shard_id = %shard.id());
                    continue;
                }
                for entry in shard.entries()? {
                    let content_tokens = tokenize_to_set(&entry.content);
                    let score = score_entry(
                        &query_tokens,
                        &content_tokens,
                        entry,
                        now,
                        self.config.half_life_days,
                    );
                    if score > 0.0 {
                        hits.push(MemoryHit {
                            entry: entry.clone(),
                            score,
                            origin: HitOrigin::Shard(shard.id().to_string()),
                        });
                    }
                }
            }
        }

        Ok(rank(hits, query.limit))
    }

    /// Convenience: query all tiers with default limit.
    pub fn search(&self, text: &str) -> Result<Vec<MemoryHit>> {
        self.query(&MemoryQuery::new(text))
    }

    /// All stored entries, oldest shards first, then the WAL, per tier.
    pub fn list_entries(&self, tier: Option<Tier>) -> Result<Vec<MemoryEntry>> {
        let mut entries = Vec::new();
        for t in TIERS {
            if tier.map(|wanted| wanted != t).unwrap_or(false) {
                continue;
            }
            for shard in &self.shards[&t] {
                entries.extend_from_slice(shard.entries()?);
            }
            entries.extend(self.wals[&t].entries()?);
        }
        Ok(entries)
    }

    /// Storage accounting per tier.
    pub fn usage(&self) -> BTreeMap<Tier, TierUsage> {
        TIERS
            .into_iter()
            .map(|tier| {
                let wal = &self.wals[&tier];
                let shards = &self.shards[&tier];
                let usage = TierUsage {
                    count: wal.len() + shards.iter().map(|s| s.info().entry_count).sum::<usize>(),
                    size_bytes: wal.size_bytes()
                        + shards.iter().map(SealedShard::disk_bytes).sum::<u64>(),
                    shard_count: shards.len(),
                    wal_count: wal.len(),
                };
                (tier, usage)
            })
            .collect()
    }

    /// Sealed shard inventory for one tier, oldest first.
    pub fn shard_infos(&self, tier: Tier) -> Vec<&ShardInfo> {
        self.shards[&tier].iter().map(SealedShard::info).collect()
    }

    /// Compact one tier's WAL into a sealed shard.
    pub fn compact(&mut self, tier: Tier) -> Result<Option<CompactionOutcome>> {
        let wal = self.wals.get_mut(&tier).expect("wal exists for every tier");
        let compacted = compact_tier(
            &self.root,
            tier,
            wal,
            self.config.false_positive_rate,
            self.config.max_hamming_distance,
        )?;
        Ok(compacted.map(|(shard, outcome)| {
            self.shards
                .get_mut(&tier)
                .expect("shard set exists for every tier")
                .push(shard);
            outcome
        }))
    }

    /// End the session: archive episodic and fact WALs into shards and
    /// clear the transient pad tier completely.
    ///
    /// A compaction failure propagates with the WALs intact; the call
    /// is retryable and nothing is lost.
    pub fn end_session(&mut self) -> Result<SessionSummary> {
        let mut sealed = Vec::new();
        for tier in [Tier::Episodic, Tier::Fact] {
            if let Some(outcome) = self.compact(tier)? {
                sealed.push(outcome.sealed);
            }
        }

        let pad_wal = self.wals.get_mut(&Tier::Pad).expect("pad wal exists");
        let mut pad_cleared = pad_wal.len();
        pad_wal.clear()?;
        for shard in self
            .shards
            .get_mut(&Tier::Pad)
            .expect("pad shard set exists")
            .drain(..)
        {
            pad_cleared += shard.info().entry_count;
            shard.delete()?;
        }

        obs::emit_session_ended(&self.session_id, sealed.len(), pad_cleared);
        Ok(SessionSummary {
            session_id: self.session_id.clone(),
            sealed,
            pad_cleared,
        })
    }

    /// Remove every entry matching `predicate`, rewriting affected
    /// WALs and shards. Fact entries are skipped unless
    /// `options.include_facts` is set. Returns the number removed.
    pub fn prune<F>(&mut self, predicate: F, options: PruneOptions) -> Result<usize>
    where
        F: Fn(&MemoryEntry) -> bool,
    {
        let mut removed = 0usize;
        let mut shards_rewritten = 0usize;

        for tier in TIERS {
            if tier.is_persistent() && !options.include_facts {
                continue;
            }

            let wal = self.wals.get_mut(&tier).expect("wal exists for every tier");
            let entries = wal.entries()?;
            let retained: Vec<MemoryEntry> =
                entries.iter().filter(|e| !predicate(e)).cloned().collect();
            if retained.len() != entries.len() {
                removed += entries.len() - retained.len();
                wal.rewrite(&retained)?;
            }

            let shards = self
                .shards
                .remove(&tier)
                .expect("shard set exists for every tier");
            let mut kept_shards = Vec::with_capacity(shards.len());
            for shard in shards {
                let entries = shard.entries()?.to_vec();
                let retained: Vec<MemoryEntry> =
                    entries.iter().filter(|e| !predicate(e)).cloned().collect();
                if retained.len() == entries.len() {
                    kept_shards.push(shard);
                    continue;
                }

                removed += entries.len() - retained.len();
                if retained.is_empty() {
                    shard.delete()?;
                    continue;
                }
                let replacement = SealedShard::create(
                    &crate::shard::shard_dir(&self.root, tier),
                    tier,
                    &retained,
                    self.config.false_positive_rate,
                )?;
                shard.delete()?;
                shards_rewritten += 1;
                kept_shards.push(replacement);
            }
            self.shards.insert(tier, kept_shards);
        }

        obs::emit_entries_pruned(removed, shards_rewritten);
        Ok(removed)
    }
}
