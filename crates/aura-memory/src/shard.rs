//! Sealed, compacted shards of memory entries.
//!
//! A shard is an `.aura` archive of entries plus a `.filter.json`
//! sidecar holding its approximate-membership filter. Shards are
//! read-only once sealed; later compaction or pruning supersedes a
//! shard with a new file, never mutates one in place.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::warn;

use aura_archive::{ArchiveReader, ArchiveWriter, Metadata};

use crate::bloom::BloomFilter;
use crate::entry::MemoryEntry;
use crate::error::{MemoryError, Result};
use crate::fingerprint::Fingerprint;
use crate::tier::Tier;
use crate::tokens::tokenize_to_set;

const SHARD_EXTENSION: &str = "aura";
const FILTER_SUFFIX: &str = ".filter.json";

/// Metadata about one sealed shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub shard_id: String,
    pub tier: Tier,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub entry_count: usize,
    pub size_bytes: u64,
}

/// Sidecar file: the shard's filter plus enough info to skip opening
/// the archive on the common path.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FilterSidecar {
    shard_id: String,
    tier: Tier,
    created_at: DateTime<Utc>,
    entry_count: usize,
    filter: BloomFilter,
}

/// A sealed shard with lazily loaded entries.
#[derive(Debug)]
pub struct SealedShard {
    info: ShardInfo,
    filter: BloomFilter,
    entries: OnceCell<Vec<MemoryEntry>>,
}

impl SealedShard {
    /// Seal `entries` into a new shard under `shard_dir`.
    ///
    /// The sidecar is written first; the shard archive is persisted
    /// last via a temp file in the same directory, so the appearance
    /// of the `.aura` file is the durable commit point. On failure the
    /// partial sidecar is removed best-effort and an error is
    /// returned; the caller's WAL must stay untouched.
    pub fn create(
        shard_dir: &Path,
        tier: Tier,
        entries: &[MemoryEntry],
        false_positive_rate: f64,
    ) -> Result<Self> {
        fs::create_dir_all(shard_dir).map_err(|e| MemoryError::Compaction {
            tier,
            reason: format!("cannot create shard directory: {e}"),
        })?;

        let created_at = Utc::now();
        let shard_id = shard_id_for(tier, created_at, entries);
        let shard_path = shard_dir.join(format!("{shard_id}.{SHARD_EXTENSION}"));
        let sidecar_path = shard_dir.join(format!("{shard_id}{FILTER_SUFFIX}"));

        let filter = build_filter(entries, false_positive_rate);
        let sidecar = FilterSidecar {
            shard_id: shard_id.clone(),
            tier,
            created_at,
            entry_count: entries.len(),
            filter,
        };

        let commit = || -> Result<u64> {
            write_json_atomic(&sidecar_path, &sidecar)?;

            let tmp = NamedTempFile::new_in(shard_dir)?;
            let mut writer = ArchiveWriter::new(tmp);
            for entry in entries {
                let payload = serde_json::to_vec(entry)?;
                writer.append_parts(&entry.id, &payload, &Metadata::new())?;
            }
            let tmp = writer.finish()?;
            tmp.persist(&shard_path).map_err(|e| e.error)?;
            Ok(fs::metadata(&shard_path)?.len())
        };

        let size_bytes = match commit() {
            Ok(size) => size,
            Err(e) => {
                if sidecar_path.exists() {
                    if let Err(cleanup) = fs::remove_file(&sidecar_path) {
                        warn!(
                            event = "memory.sidecar_cleanup_failed",
                            path = %sidecar_path.display(),
                            error = %cleanup,
                        );
                    }
                }
                return Err(MemoryError::Compaction {
                    tier,
                    reason: e.to_string(),
                });
            }
        };

        Ok(Self {
            info: ShardInfo {
                shard_id,
                tier,
                path: shard_path,
                created_at,
                entry_count: entries.len(),
                size_bytes,
            },
            filter: sidecar.filter,
            entries: {
                let cell = OnceCell::new();
                let _ = cell.set(entries.to_vec());
                cell
            },
        })
    }

    /// Load a sealed shard from its `.aura` path.
    ///
    /// When the sidecar is missing or unreadable the filter is rebuilt
    /// from the archive: a degraded open must never manufacture false
    /// negatives.
    pub fn load(shard_path: &Path, tier: Tier, false_positive_rate: f64) -> Result<Self> {
        let shard_id = shard_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let sidecar_path = shard_path.with_file_name(format!("{shard_id}{FILTER_SUFFIX}"));
        let size_bytes = fs::metadata(shard_path)?.len();

        if let Some(sidecar) = read_sidecar(&sidecar_path, &shard_id) {
            return Ok(Self {
                info: ShardInfo {
                    shard_id,
                    tier,
                    path: shard_path.to_path_buf(),
                    created_at: sidecar.created_at,
                    entry_count: sidecar.entry_count,
                    size_bytes,
                },
                filter: sidecar.filter,
                entries: OnceCell::new(),
            });
        }

        warn!(
            event = "memory.shard_filter_rebuilt",
            shard_id = %shard_id,
            tier = %tier,
        );
        let entries = read_entries(shard_path, &shard_id)?;
        let filter = build_filter(&entries, false_positive_rate);
        let created_at = entries
            .first()
            .map(|e| e.created_at)
            .unwrap_or_else(Utc::now);
        Ok(Self {
            info: ShardInfo {
                shard_id,
                tier,
                path: shard_path.to_path_buf(),
                created_at,
                entry_count: entries.len(),
                size_bytes,
            },
            filter,
            entries: {
                let cell = OnceCell::new();
                let _ = cell.set(entries);
                cell
            },
        })
    }

    pub fn info(&self) -> &ShardInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.shard_id
    }

    pub fn tier(&self) -> Tier {
        self.info.tier
    }

    /// Whether an entry with this exact fingerprint may be present.
    pub fn may_contain(&self, fingerprint: &Fingerprint) -> bool {
        self.filter.contains(fingerprint.as_bytes())
    }

    /// Whether any of `tokens` may appear in this shard's contents.
    /// `false` means the shard can be skipped for the query entirely.
    pub fn may_match_tokens(&self, tokens: &HashSet<String>) -> bool {
        tokens.iter().any(|t| self.filter.contains(t.as_bytes()))
    }

    /// Entries in original write order, loaded on first use.
    pub fn entries(&self) -> Result<&[MemoryEntry]> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries.as_slice());
        }
        let loaded = read_entries(&self.info.path, &self.info.shard_id)?;
        Ok(self.entries.get_or_init(|| loaded).as_slice())
    }

    /// Remove the shard file and its sidecar.
    pub fn delete(self) -> Result<()> {
        let sidecar = self
            .info
            .path
            .with_file_name(format!("{}{FILTER_SUFFIX}", self.info.shard_id));
        fs::remove_file(&self.info.path)?;
        if sidecar.exists() {
            fs::remove_file(&sidecar)?;
        }
        Ok(())
    }

    /// Total on-disk footprint including the sidecar.
    pub fn disk_bytes(&self) -> u64 {
        let sidecar = self
            .info
            .path
            .with_file_name(format!("{}{FILTER_SUFFIX}", self.info.shard_id));
        self.info.size_bytes + fs::metadata(sidecar).map(|m| m.len()).unwrap_or(0)
    }
}

/// Discover sealed shards for `tier` under `root`, oldest first.
pub fn discover_shards(root: &Path, tier: Tier, false_positive_rate: f64) -> Result<Vec<SealedShard>> {
    let shard_dir = root.join(tier.dir_name()).join("shards");
    if !shard_dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(&shard_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(SHARD_EXTENSION))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|p| SealedShard::load(&p, tier, false_positive_rate))
        .collect()
}

/// Shard directory for a tier.
pub fn shard_dir(root: &Path, tier: Tier) -> PathBuf {
    root.join(tier.dir_name()).join("shards")
}

fn shard_id_for(tier: Tier, created_at: DateTime<Utc>, entries: &[MemoryEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.fingerprint.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!(
        "{}_{}_{}",
        tier.dir_name(),
        created_at.format("%Y%m%d_%H%M%S"),
        &digest[..8]
    )
}

/// Filter over exact fingerprints (dedup gating) and content tokens
/// (query gating).
fn build_filter(entries: &[MemoryEntry], false_positive_rate: f64) -> BloomFilter {
    let token_sets: Vec<HashSet<String>> = entries
        .iter()
        .map(|e| tokenize_to_set(&e.content))
        .collect();
    let key_estimate = entries.len() + token_sets.iter().map(HashSet::len).sum::<usize>();

    let mut filter = BloomFilter::with_rate(key_estimate, false_positive_rate);
    for (entry, tokens) in entries.iter().zip(&token_sets) {
        filter.insert(entry.fingerprint.as_bytes());
        for token in tokens {
            filter.insert(token.as_bytes());
        }
    }
    filter
}

fn read_entries(shard_path: &Path, shard_id: &str) -> Result<Vec<MemoryEntry>> {
    let reader = ArchiveReader::open(shard_path)?;
    reader
        .iter()
        .map(|record| {
            let record = record?;
            serde_json::from_slice::<MemoryEntry>(&record.payload).map_err(|e| {
                MemoryError::CorruptShardEntry {
                    shard_id: shard_id.to_string(),
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

fn read_sidecar(path: &Path, shard_id: &str) -> Option<FilterSidecar> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice::<FilterSidecar>(&bytes) {
        Ok(sidecar) if sidecar.shard_id == shard_id => Some(sidecar),
        Ok(_) => {
            warn!(event = "memory.sidecar_id_mismatch", shard_id = %shard_id);
            None
        }
        Err(e) => {
            warn!(event = "memory.sidecar_unreadable", shard_id = %shard_id, error = %e);
            None
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "sidecar path has no parent")
    })?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut tmp, value)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(tier: Tier, contents: &[&str]) -> Vec<MemoryEntry> {
        contents
            .iter()
            .map(|c| MemoryEntry::new(tier, *c, "agent", "s1"))
            .collect()
    }

    #[test]
    fn create_and_reload_shard() {
        let dir = tempfile::tempdir().unwrap();
        let shard_dir = dir.path().join("fact").join("shards");
        let batch = entries(Tier::Fact, &["api key rotates monthly", "deploys on tuesday"]);

        let shard = SealedShard::create(&shard_dir, Tier::Fact, &batch, 0.01).unwrap();
        assert_eq!(shard.info().entry_count, 2);
        assert!(shard.id().starts_with("fact_"));

        let reloaded = SealedShard::load(&shard.info().path, Tier::Fact, 0.01).unwrap();
        assert_eq!(reloaded.entries().unwrap(), batch.as_slice());
    }

    #[test]
    fn filter_gates_fingerprints_and_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let shard_dir = dir.path().join("fact").join("shards");
        let batch = entries(Tier::Fact, &["api key rotates monthly"]);
        let shard = SealedShard::create(&shard_dir, Tier::Fact, &batch, 0.01).unwrap();

        assert!(shard.may_contain(&batch[0].fingerprint));
        assert!(shard.may_match_tokens(&tokenize_to_set("api key")));
        // A fully disjoint query is definitively absent.
        assert!(!shard.may_match_tokens(&tokenize_to_set("zzqx qqzw")));
    }

    #[test]
    fn missing_sidecar_rebuilds_filter() {
        let dir = tempfile::tempdir().unwrap();
        let shard_dir = dir.path().join("episodic").join("shards");
        let batch = entries(Tier::Episodic, &["session discussed rollout plan"]);
        let shard = SealedShard::create(&shard_dir, Tier::Episodic, &batch, 0.01).unwrap();

        let sidecar = shard_dir.join(format!("{}{FILTER_SUFFIX}", shard.id()));
        fs::remove_file(&sidecar).unwrap();

        let reloaded = SealedShard::load(&shard.info().path, Tier::Episodic, 0.01).unwrap();
        assert!(reloaded.may_match_tokens(&tokenize_to_set("rollout")));
        assert!(reloaded.may_contain(&batch[0].fingerprint));
    }

    #[test]
    fn discover_orders_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let sdir = shard_dir(dir.path(), Tier::Fact);
        let first = entries(Tier::Fact, &["first batch"]);
        let second = entries(Tier::Fact, &["second batch"]);
        SealedShard::create(&sdir, Tier::Fact, &first, 0.01).unwrap();
        SealedShard::create(&sdir, Tier::Fact, &second, 0.01).unwrap();

        let found = discover_shards(dir.path(), Tier::Fact, 0.01).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].id() <= found[1].id());
    }

    #[test]
    fn delete_removes_shard_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let sdir = shard_dir(dir.path(), Tier::Pad);
        let batch = entries(Tier::Pad, &["scratch"]);
        let shard = SealedShard::create(&sdir, Tier::Pad, &batch, 0.01).unwrap();
        let path = shard.info().path.clone();
        shard.delete().unwrap();
        assert!(!path.exists());
        assert_eq!(fs::read_dir(&sdir).unwrap().count(), 0);
    }
}
