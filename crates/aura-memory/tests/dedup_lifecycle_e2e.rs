//! End-to-end tests for write dedup, noise filtering, and the session
//! lifecycle.

use aura_memory::{
    MemoryConfig, MemoryStore, NoiseFilter, PruneOptions, Tier, WriteOutcome,
};

#[test]
fn test_worked_example_idempotent_fact_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();

    assert!(store
        .write(Tier::Fact, "API key rotates monthly")
        .unwrap()
        .is_stored());

    let hits = store.search("API key").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entry.content, "API key rotates monthly");

    let before = store.usage()[&Tier::Fact].count;
    assert_eq!(
        store.write(Tier::Fact, "API key rotates monthly").unwrap(),
        WriteOutcome::DuplicateExact
    );
    assert_eq!(store.usage()[&Tier::Fact].count, before);
}

#[test]
fn test_near_duplicate_does_not_grow_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();
    store.write(Tier::Fact, "API key rotates monthly").unwrap();

    // Same words, different casing and punctuation: distinct exact
    // fingerprint, identical similarity fingerprint.
    let outcome = store
        .write(Tier::Fact, "api key, rotates: MONTHLY")
        .unwrap();
    assert!(matches!(outcome, WriteOutcome::NearDuplicate { .. }));
    assert_eq!(store.usage()[&Tier::Fact].count, 1);
}

#[test]
fn test_dedup_is_per_tier() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();
    assert!(store
        .write(Tier::Episodic, "retro covered oncall fatigue")
        .unwrap()
        .is_stored());
    assert!(store
        .write(Tier::Fact, "retro covered oncall fatigue")
        .unwrap()
        .is_stored());
}

#[test]
fn test_noise_filter_denies_meta_chatter() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();

    for junk in [
        "What do you remember about this project?",
        "I don't have access to previous sessions",
        "   ",
    ] {
        assert_eq!(
            store.write(Tier::Episodic, junk).unwrap(),
            WriteOutcome::RejectedNoise,
            "expected noise: {junk:?}"
        );
    }
    assert_eq!(store.usage()[&Tier::Episodic].count, 0);
}

#[test]
fn test_noise_filter_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let config = MemoryConfig {
        noise_filtering: false,
        ..MemoryConfig::default()
    };
    let mut store = MemoryStore::open_with_config(dir.path(), config).unwrap();
    assert!(store
        .write(Tier::Pad, "What do you remember about this project?")
        .unwrap()
        .is_stored());
}

#[test]
fn test_custom_noise_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(dir.path()).unwrap();
    let mut store =
        store.with_noise_filter(NoiseFilter::with_patterns([r"(?i)^draft:"]).unwrap());

    assert_eq!(
        store.write(Tier::Pad, "DRAFT: not worth keeping").unwrap(),
        WriteOutcome::RejectedNoise
    );
    // The default denylist no longer applies.
    assert!(store
        .write(Tier::Pad, "What do you remember about me?")
        .unwrap()
        .is_stored());
}

#[test]
fn test_session_lifecycle_per_tier() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();
    store.write(Tier::Pad, "scratch idea about caching").unwrap();
    store
        .write(Tier::Episodic, "walked through the incident timeline")
        .unwrap();
    store.write(Tier::Fact, "postmortems live in the wiki").unwrap();

    let summary = store.end_session().unwrap();
    assert_eq!(summary.pad_cleared, 1);
    assert_eq!(summary.sealed.len(), 2);

    // Pad is transient; episodic and fact were archived.
    assert!(store.search("caching").unwrap().is_empty());
    assert_eq!(store.search("incident timeline").unwrap().len(), 1);
    assert_eq!(store.search("postmortems").unwrap().len(), 1);

    // Fact entries persist across store instances.
    drop(store);
    let store = MemoryStore::open(dir.path()).unwrap();
    assert_eq!(store.search("postmortems").unwrap().len(), 1);
}

#[test]
fn test_end_session_clears_explicitly_compacted_pad_shards() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();
    store.write(Tier::Pad, "pad thought one about buffers").unwrap();
    store.compact(Tier::Pad).unwrap();
    store.write(Tier::Pad, "pad thought two about sockets").unwrap();

    let summary = store.end_session().unwrap();
    assert_eq!(summary.pad_cleared, 2);
    assert_eq!(store.usage()[&Tier::Pad].count, 0);
    assert_eq!(store.usage()[&Tier::Pad].shard_count, 0);
}

#[test]
fn test_prune_by_predicate_respects_fact_protection() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = MemoryStore::open(dir.path()).unwrap();
    store
        .write(Tier::Episodic, "obsolete meeting notes from march")
        .unwrap();
    store
        .write(Tier::Fact, "obsolete port assignment table")
        .unwrap();
    store.end_session().unwrap();

    let removed = store
        .prune(
            |e| e.content.starts_with("obsolete"),
            PruneOptions::default(),
        )
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.usage()[&Tier::Episodic].count, 0);
    assert_eq!(store.usage()[&Tier::Fact].count, 1);

    let removed = store
        .prune(
            |e| e.content.starts_with("obsolete"),
            PruneOptions {
                include_facts: true,
            },
        )
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.usage()[&Tier::Fact].count, 0);
}

#[test]
fn test_usage_tracks_wal_and_shards() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = MemoryStore::open(dir.path())?;
    store.write(Tier::Fact, "first fact about the scheduler")?;
    store.end_session()?;
    store.write(Tier::Fact, "second fact about the allocator")?;

    let usage = store.usage();
    let fact = &usage[&Tier::Fact];
    assert_eq!(fact.count, 2);
    assert_eq!(fact.wal_count, 1);
    assert_eq!(fact.shard_count, 1);
    assert!(fact.size_bytes > 0);
    Ok(())
}
