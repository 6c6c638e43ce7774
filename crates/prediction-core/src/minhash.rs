//! MinHash / LSH Encoder
//!
//! Derives a MinHash signature and LSH band keys for a pattern's (or STM's)
//! token multiset, enabling approximate-Jaccard candidate filtering at scale
//! without an O(n^2) pairwise comparison.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Default number of hash functions in a MinHash signature.
pub const DEFAULT_NUM_HASHES: usize = 100;
/// Default number of LSH bands.
pub const DEFAULT_BANDS: usize = 20;
/// Default rows per band (`bands * rows == num_hashes`).
pub const DEFAULT_ROWS: usize = 5;

/// A fixed-size MinHash signature: `K` 64-bit minima, one per hash seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinHashSignature(pub Vec<u64>);

impl MinHashSignature {
    /// Split the signature into `bands` band keys of `rows` rows each.
    ///
    /// `bands * rows` must equal `self.0.len()`; callers are expected to have
    /// validated this via the engine config before calling.
    pub fn lsh_bands(&self, bands: usize, rows: usize) -> Vec<String> {
        debug_assert_eq!(bands * rows, self.0.len());
        self.0
            .chunks(rows)
            .take(bands)
            .map(|chunk| {
                let mut hasher = DefaultHasher::new();
                for v in chunk {
                    v.hash(&mut hasher);
                }
                format!("{:016x}", hasher.finish())
            })
            .collect()
    }
}

/// Hash one token under hash-function seed `seed`.
///
/// Uses the standard library's `SipHash` seeded with an index-derived value;
/// this is a bespoke, dependency-free stand-in for a dedicated MinHash crate
/// and is sufficient because only internal self-consistency (same seed set
/// used for STM and for stored patterns) is required, not cross-process
/// compatibility with any external MinHash implementation.
fn seeded_hash(seed: u64, token: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    token.hash(&mut hasher);
    hasher.finish()
}

/// Compute a `num_hashes`-wide MinHash signature over a token multiset.
///
/// An empty multiset yields an all-`u64::MAX` signature, which — by
/// construction — never collides with any non-empty signature's bands, so it
/// never spuriously matches under the MinHash filter stage.
pub fn compute_signature<'a, I>(tokens: I, num_hashes: usize) -> MinHashSignature
where
    I: IntoIterator<Item = &'a str>,
{
    let set: BTreeSet<&str> = tokens.into_iter().collect();
    if set.is_empty() {
        return MinHashSignature(vec![u64::MAX; num_hashes]);
    }
    let mut minima = vec![u64::MAX; num_hashes];
    for token in set {
        for (seed, slot) in minima.iter_mut().enumerate() {
            let h = seeded_hash(seed as u64, token);
            if h < *slot {
                *slot = h;
            }
        }
    }
    MinHashSignature(minima)
}

/// Estimate the Jaccard similarity of two multisets from their signatures
/// (fraction of agreeing rows). Used only for diagnostics/tests; the filter
/// pipeline relies on band-key collision, not this estimate, for its
/// reject/keep decision.
pub fn estimate_jaccard(a: &MinHashSignature, b: &MinHashSignature) -> f64 {
    if a.0.is_empty() {
        return 0.0;
    }
    let agree = a.0.iter().zip(b.0.iter()).filter(|(x, y)| x == y).count();
    agree as f64 / a.0.len() as f64
}
