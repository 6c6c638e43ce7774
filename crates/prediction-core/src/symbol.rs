//! Symbol Canonicalizer
//!
//! Turns a raw, multimodal `Observation` into zero or one canonical `Event`
//! plus its emotives and metadata. Canonicalization has no nondeterministic
//! inputs: the same observation under the same config always yields the same
//! event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tenant::TenantId;
use crate::vector_index::VectorIndexer;

/// A raw, multimodal input unit.
///
/// An observation is considered *empty* (and silently dropped) if all four
/// fields are empty or absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Unordered set of string symbols.
    #[serde(default)]
    pub strings: Vec<String>,
    /// Ordered numeric vectors, each resolved to a synthetic symbol.
    #[serde(default)]
    pub vectors: Vec<Vec<f32>>,
    /// Emotive name -> scalar in `[-1, 1]`.
    #[serde(default)]
    pub emotives: BTreeMap<String, f64>,
    /// Free-form metadata, preserved for accumulation.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Observation {
    /// An observation is empty if every field is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
            && self.vectors.is_empty()
            && self.emotives.is_empty()
            && self.metadata.is_empty()
    }
}

/// A canonical, ordered, non-empty sequence of symbols derived from one
/// observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Symbols in canonical order: vector-derived symbols first (input
    /// order), then string symbols (sorted if `sort_symbols` is set).
    pub symbols: Vec<String>,
}

impl Event {
    /// Construct an event from an explicit symbol list. Used by the pattern
    /// store when reconstructing events from persisted rows.
    pub fn new(symbols: Vec<String>) -> Self {
        Self { symbols }
    }

    /// An event's token set (duplicates collapsed), used for set-membership
    /// comparisons.
    pub fn token_set(&self) -> std::collections::BTreeSet<&str> {
        self.symbols.iter().map(String::as_str).collect()
    }
}

/// The result of canonicalizing one observation: an optional event (absent
/// only when the observation had no symbols), plus the observation's
/// emotives and metadata for accumulation.
#[derive(Debug, Clone, Default)]
pub struct CanonicalObservation {
    /// `None` when the observation had no vector or string symbols at all
    /// (even if emotives/metadata were present).
    pub event: Option<Event>,
    /// Emotives carried through unconditionally.
    pub emotives: BTreeMap<String, f64>,
    /// Metadata carried through unconditionally.
    pub metadata: BTreeMap<String, String>,
}

/// Canonicalize a raw observation into an event plus side-channel data.
///
/// `sort_symbols`: whether string symbols are byte-lexicographically sorted
/// within the event (vector-derived symbols are never reordered; they always
/// precede string symbols in their original input order).
pub fn canonicalize(
    obs: &Observation,
    indexer: &dyn VectorIndexer,
    tenant: &TenantId,
    sort_symbols: bool,
) -> CanonicalObservation {
    if obs.is_empty() {
        return CanonicalObservation::default();
    }

    let mut symbols: Vec<String> = Vec::with_capacity(obs.vectors.len() + obs.strings.len());
    for v in &obs.vectors {
        symbols.push(indexer.index(tenant, v));
    }

    let mut strings = obs.strings.clone();
    if sort_symbols {
        strings.sort();
    }
    symbols.extend(strings);

    let event = if symbols.is_empty() {
        None
    } else {
        Some(Event::new(symbols))
    };

    CanonicalObservation {
        event,
        emotives: obs.emotives.clone(),
        metadata: obs.metadata.clone(),
    }
}
