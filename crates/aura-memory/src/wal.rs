//! Per-tier write-ahead log.
//!
//! Speed 1 of the two-speed write path: every write is a single JSONL
//! append and returns immediately. Compaction (speed 2) folds the log
//! into a sealed shard and only then truncates it, so the log is the
//! recovery source of truth until a shard commit succeeds.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::entry::MemoryEntry;
use crate::error::Result;
use crate::tier::Tier;

const ACTIVE_WAL_FILE: &str = "active.jsonl";

/// Append-only ordered log of pending entries for one tier.
#[derive(Debug)]
pub struct TierWal {
    tier: Tier,
    path: PathBuf,
    entry_count: usize,
}

impl TierWal {
    /// Open (or create) the active WAL for `tier` under `root`.
    ///
    /// A log with malformed lines (torn append before a crash) is
    /// repaired in place: the parseable entries are rewritten so later
    /// appends cannot merge into the damaged tail.
    pub fn open(root: &Path, tier: Tier) -> Result<Self> {
        let wal_dir = root.join(tier.dir_name()).join("wal");
        fs::create_dir_all(&wal_dir)?;
        let path = wal_dir.join(ACTIVE_WAL_FILE);

        let mut wal = Self {
            tier,
            path,
            entry_count: 0,
        };
        let (entries, skipped) = wal.read_entries()?;
        if skipped > 0 {
            warn!(event = "memory.wal_repaired", tier = %tier, skipped = skipped);
            wal.rewrite(&entries)?;
        }
        wal.entry_count = entries.len();
        Ok(wal)
    }

    /// Append one entry. Write order is preserved.
    pub fn append(&mut self, entry: &MemoryEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.flush()?;

        self.entry_count += 1;
        Ok(())
    }

    /// All entries in write order.
    ///
    /// A malformed line (torn append, manual edit) is skipped with a
    /// warning rather than poisoning the whole log.
    pub fn entries(&self) -> Result<Vec<MemoryEntry>> {
        Ok(self.read_entries()?.0)
    }

    fn read_entries(&self) -> Result<(Vec<MemoryEntry>, usize)> {
        if !self.path.exists() {
            return Ok((Vec::new(), 0));
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    skipped += 1;
                    warn!(
                        event = "memory.wal_line_skipped",
                        tier = %self.tier,
                        line = line_no + 1,
                        error = %e,
                    );
                }
            }
        }
        Ok((entries, skipped))
    }

    /// Buffered entry count.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// On-disk size of the active log.
    pub fn size_bytes(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Remove the active log. Called only after a durable shard commit
    /// (or when a transient tier is cleared at session end).
    pub fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.entry_count = 0;
        Ok(())
    }

    /// Replace the log's contents atomically (temp file + rename), used
    /// by pruning. Write order of `entries` is preserved.
    pub fn rewrite(&mut self, entries: &[MemoryEntry]) -> Result<()> {
        if entries.is_empty() {
            return self.clear();
        }

        let dir = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "wal path has no parent")
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        for entry in entries {
            serde_json::to_writer(&mut tmp, entry)?;
            tmp.write_all(b"\n")?;
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        self.entry_count = entries.len();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tier: Tier, content: &str) -> MemoryEntry {
        MemoryEntry::new(tier, content, "agent", "s1")
    }

    #[test]
    fn append_and_read_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = TierWal::open(dir.path(), Tier::Episodic).unwrap();
        wal.append(&entry(Tier::Episodic, "first")).unwrap();
        wal.append(&entry(Tier::Episodic, "second")).unwrap();
        wal.append(&entry(Tier::Episodic, "third")).unwrap();

        let contents: Vec<String> = wal
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(wal.len(), 3);
    }

    #[test]
    fn reopen_recovers_count() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut wal = TierWal::open(dir.path(), Tier::Fact).unwrap();
            wal.append(&entry(Tier::Fact, "persisted")).unwrap();
        }
        let wal = TierWal::open(dir.path(), Tier::Fact).unwrap();
        assert_eq!(wal.len(), 1);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = TierWal::open(dir.path(), Tier::Pad).unwrap();
        wal.append(&entry(Tier::Pad, "good")).unwrap();

        // Simulate a torn append.
        let mut file = OpenOptions::new().append(true).open(wal.path()).unwrap();
        file.write_all(b"{\"tier\": \"pad\", \"conte").unwrap();
        drop(file);

        let mut recovered = TierWal::open(dir.path(), Tier::Pad).unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered.entries().unwrap()[0].content, "good");

        // The damaged tail was repaired away, so appends stay intact.
        recovered.append(&entry(Tier::Pad, "after repair")).unwrap();
        let contents: Vec<String> = recovered
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["good", "after repair"]);
    }

    #[test]
    fn clear_removes_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = TierWal::open(dir.path(), Tier::Pad).unwrap();
        wal.append(&entry(Tier::Pad, "scratch")).unwrap();
        wal.clear().unwrap();
        assert!(wal.is_empty());
        assert!(!wal.path().exists());
        assert!(wal.entries().unwrap().is_empty());
    }
}
