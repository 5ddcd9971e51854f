//! Approximate-membership filter attached to sealed shards.

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};

/// Minimum filter size, so tiny shards still get a usable filter.
const MIN_BITS: u64 = 64;

/// Bloom filter over byte keys.
///
/// Sized from an expected item count and a target false-positive rate.
/// May report a key it never saw (false positive); by construction it
/// never denies a key that was inserted (no false negatives), so a
/// negative answer is always safe to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomFilter {
    num_bits: u64,
    num_hashes: u32,
    #[serde(with = "hex_bytes")]
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Build a filter for about `expected_items` keys at
    /// `false_positive_rate` (clamped to a sane range).
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-6, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let m = ((-n * p.ln()) / (ln2 * ln2)).ceil() as u64;
        let num_bits = m.max(MIN_BITS);
        let num_hashes = (((num_bits as f64 / n) * ln2).round() as u32).max(1);

        Self {
            num_bits,
            num_hashes,
            bits: vec![0u8; num_bits.div_ceil(8) as usize],
        }
    }

    /// Insert a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let bit = probe(h1, h2, i, self.num_bits);
            self.bits[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    /// Whether the key may have been inserted. `false` is definitive.
    pub fn contains(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        (0..self.num_hashes).all(|i| {
            let bit = probe(h1, h2, i, self.num_bits);
            self.bits[(bit / 8) as usize] & (1 << (bit % 8)) != 0
        })
    }

    /// Serialized bitset size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.bits.len()
    }
}

/// Two independent 64-bit hashes from one SHA-256 digest.
fn hash_pair(key: &[u8]) -> (u64, u64) {
    let digest = Sha256::digest(key);
    let h1 = u64::from_le_bytes(digest[..8].try_into().expect("digest is 32 bytes"));
    // Force h2 odd so successive probes cycle through distinct bits.
    let h2 = u64::from_le_bytes(digest[8..16].try_into().expect("digest is 32 bytes")) | 1;
    (h1, h2)
}

fn probe(h1: u64, h2: u64, i: u32, num_bits: u64) -> u64 {
    h1.wrapping_add((i as u64).wrapping_mul(h2)) % num_bits
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
