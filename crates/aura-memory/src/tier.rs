//! Memory durability tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The three durability classes of agent memory.
///
/// - `/pad`      - working notepad; transient, cleared at session end
/// - `/episodic` - session logs; auto-archived at session end
/// - `/fact`     - verified knowledge; persists indefinitely
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Pad,
    Episodic,
    Fact,
}

/// All tiers, pad first.
pub const TIERS: [Tier; 3] = [Tier::Pad, Tier::Episodic, Tier::Fact];

impl Tier {
    /// Directory name under the memory root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Tier::Pad => "pad",
            Tier::Episodic => "episodic",
            Tier::Fact => "fact",
        }
    }

    /// Ranking multiplier: fact entries outrank episodic, episodic
    /// outrank pad, all else equal.
    pub fn score_bonus(self) -> f64 {
        match self {
            Tier::Pad => 0.9,
            Tier::Episodic => 1.0,
            Tier::Fact => 1.1,
        }
    }

    /// Whether entries survive `end_session`.
    pub fn is_transient(self) -> bool {
        matches!(self, Tier::Pad)
    }

    /// Whether entries are protected from pruning by default.
    pub fn is_persistent(self) -> bool {
        matches!(self, Tier::Fact)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pad" => Ok(Tier::Pad),
            "episodic" => Ok(Tier::Episodic),
            "fact" => Ok(Tier::Fact),
            other => Err(format!("invalid tier '{other}' (expected pad, episodic, or fact)")),
        }
    }
}

/// Storage accounting for one tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierUsage {
    /// Total entries across WAL and sealed shards.
    pub count: usize,
    /// On-disk bytes (WAL file plus shard files and sidecars).
    pub size_bytes: u64,
    /// Sealed shard count.
    pub shard_count: usize,
    /// Entries still buffered in the WAL.
    pub wal_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering_bonus() {
        assert!(Tier::Fact.score_bonus() > Tier::Episodic.score_bonus());
        assert!(Tier::Episodic.score_bonus() > Tier::Pad.score_bonus());
    }

    #[test]
    fn test_tier_parse_roundtrip() {
        for tier in TIERS {
            let parsed: Tier = tier.to_string().parse().unwrap();
            assert_eq!(parsed, tier);
        }
        assert!("working".parse::<Tier>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Tier::Episodic).unwrap(), "\"episodic\"");
    }

    #[test]
    fn test_lifecycle_flags() {
        assert!(Tier::Pad.is_transient());
        assert!(!Tier::Episodic.is_transient());
        assert!(Tier::Fact.is_persistent());
        assert!(!Tier::Pad.is_persistent());
    }
}
