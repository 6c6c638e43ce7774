//! Pattern data model
//!
//! `Pattern` is the learned, content-addressed sequence stored by the
//! Pattern Store. `PatternMetadata` and `SymbolStatistics` are the two
//! satellite records kept in the point-lookup metadata store and the
//! symbol-statistics store respectively.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::pattern_identifier;
use crate::minhash::{compute_signature, MinHashSignature};
use crate::stm::RollingWindow;
use crate::symbol::Event;
use crate::tenant::TenantId;

/// A learned, content-addressed sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    /// `PTRN|<hex>` identifier; a pure function of `events`.
    pub identifier: String,
    /// Isolation key derived from the caller's node identifier.
    pub tenant_id: TenantId,
    /// The event sequence that produced the hash.
    pub events: Vec<Event>,
    /// `events.len()`.
    pub length: usize,
    /// Union of all symbols across events.
    pub token_multiset: BTreeSet<String>,
    /// First symbol of the first event.
    pub first_token: Option<String>,
    /// Last symbol of the last event.
    pub last_token: Option<String>,
    /// Fixed-size MinHash signature over `token_multiset`.
    pub minhash_signature: MinHashSignature,
    /// LSH band keys derived from `minhash_signature`.
    pub lsh_bands: Vec<String>,
    /// When this pattern was first learned.
    pub created_at: DateTime<Utc>,
    /// When this pattern was last re-learned.
    pub updated_at: DateTime<Utc>,
}

impl Pattern {
    /// Build a pattern from an event sequence, computing its identifier,
    /// multiset, endpoints, and MinHash/LSH encoding.
    ///
    /// `num_hashes`, `bands`, `rows` must satisfy `bands * rows == num_hashes`
    /// (validated by the config resolver before this is ever called).
    pub fn build(
        tenant_id: TenantId,
        events: Vec<Event>,
        num_hashes: usize,
        bands: usize,
        rows: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let identifier = pattern_identifier(&events);
        let length = events.len();
        let token_multiset: BTreeSet<String> = events
            .iter()
            .flat_map(|e| e.symbols.iter().cloned())
            .collect();
        let first_token = events.first().and_then(|e| e.symbols.first()).cloned();
        let last_token = events.last().and_then(|e| e.symbols.last()).cloned();
        let minhash_signature =
            compute_signature(token_multiset.iter().map(String::as_str), num_hashes);
        let lsh_bands = minhash_signature.lsh_bands(bands, rows);

        Self {
            identifier,
            tenant_id,
            events,
            length,
            token_multiset,
            first_token,
            last_token,
            minhash_signature,
            lsh_bands,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per `(tenant_id, identifier)` accumulated frequency, emotive profile, and
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMetadata {
    /// Incremented on each re-learning of the same identifier.
    pub frequency: u64,
    /// Per emotive name, a rolling window of values observed at learn time.
    pub emotive_profile: BTreeMap<String, RollingWindow<f64>>,
    /// Per key, the set of all observed values (union accumulation).
    pub metadata: BTreeMap<String, BTreeSet<String>>,
}

impl PatternMetadata {
    /// Seed a brand-new metadata record for a pattern's first learn.
    pub fn seed(
        emotives: &BTreeMap<String, f64>,
        metadata: &BTreeMap<String, String>,
        window_size: usize,
    ) -> Self {
        let mut profile = BTreeMap::new();
        for (name, value) in emotives {
            let mut window = RollingWindow::new(window_size);
            window.push(*value);
            profile.insert(name.clone(), window);
        }
        let mut meta_acc = BTreeMap::new();
        for (k, v) in metadata {
            let mut set = BTreeSet::new();
            set.insert(v.clone());
            meta_acc.insert(k.clone(), set);
        }
        Self {
            frequency: 1,
            emotive_profile: profile,
            metadata: meta_acc,
        }
    }

    /// Merge a re-learn's emotives and metadata into this record: append to
    /// the emotive profile and union-accumulate metadata values.
    ///
    /// Deliberately does not touch `frequency` — callers drive that through
    /// `MetadataStore::increment_frequency`'s atomic counter (see
    /// `engine::learn`) so that frequency is incremented exactly once per
    /// learn even under concurrent re-learns of the same identifier.
    pub fn merge_relearn(
        &mut self,
        emotives: &BTreeMap<String, f64>,
        metadata: &BTreeMap<String, String>,
        window_size: usize,
    ) {
        for (name, value) in emotives {
            self.emotive_profile
                .entry(name.clone())
                .or_insert_with(|| RollingWindow::new(window_size))
                .push(*value);
        }
        for (k, v) in metadata {
            self.metadata.entry(k.clone()).or_default().insert(v.clone());
        }
    }
}

/// Per `(tenant_id, symbol)` frequency counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SymbolStatistics {
    /// Total occurrences across all learned patterns (including re-learns).
    pub frequency: u64,
    /// Number of distinct patterns containing the symbol (incremented only
    /// on first-time pattern creation).
    pub pattern_member_frequency: u64,
}
