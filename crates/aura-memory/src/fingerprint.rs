//! Exact and similarity fingerprints for memory content.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};

use crate::tokens::tokenize;

/// SHA-256 content fingerprint used for exact deduplication.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of `content`.
    pub fn compute(content: &str) -> Self {
        let hash = Sha256::digest(content.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hash);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex chars, used in shard ids.
    pub fn short_hex(&self) -> String {
        self.to_hex().chars().take(8).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> String {
        fp.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let bytes = hex::decode(&s).map_err(|_| format!("invalid fingerprint hex: {s}"))?;
        if bytes.len() != 32 {
            return Err(format!("invalid fingerprint length: {}", bytes.len()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// 64-bit similarity fingerprint over content tokens.
///
/// Token hashes vote per bit position; near-duplicate texts land
/// within a small hamming distance of each other. Token hashes are
/// SHA-256 prefixes, so the value is stable across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimHash(u64);

impl SimHash {
    /// Similarity fingerprint of `content`.
    pub fn compute(content: &str) -> Self {
        let tokens = tokenize(content);
        if tokens.is_empty() {
            return Self(0);
        }

        let mut votes = [0i32; 64];
        for token in &tokens {
            let h = token_hash(token);
            for (bit, vote) in votes.iter_mut().enumerate() {
                if h & (1u64 << bit) != 0 {
                    *vote += 1;
                } else {
                    *vote -= 1;
                }
            }
        }

        let mut value = 0u64;
        for (bit, vote) in votes.iter().enumerate() {
            if *vote > 0 {
                value |= 1u64 << bit;
            }
        }
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Hamming distance to another similarity fingerprint.
    pub fn distance(self, other: SimHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

/// Stable 64-bit hash of one token (SHA-256 prefix).
fn token_hash(token: &str) -> u64 {
    let digest = Sha256::digest(token.as_bytes());
    u64::from_le_bytes(digest[..8].try_into().expect("digest has at least 8 bytes"))
}
