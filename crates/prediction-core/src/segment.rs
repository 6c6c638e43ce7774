//! Temporal segmentation
//!
//! Splits a candidate pattern into past/present/future against the current
//! STM, plus the missing (pattern-side) and extras (STM-side) deltas,
//! event-aligned with `present` and the STM respectively.

use std::collections::BTreeSet;

use crate::pattern::Pattern;
use crate::stm::Stm;
use crate::symbol::Event;

/// The outcome of segmenting one pattern against the current STM.
#[derive(Debug, Clone)]
pub struct Segment {
    pub past: Vec<Event>,
    /// Present events, returned complete (the full stored event, not the
    /// intersection with STM) so callers can see what was expected.
    pub present: Vec<Event>,
    pub future: Vec<Event>,
    /// Per present event, the symbols in that event absent from STM.
    pub missing: Vec<BTreeSet<String>>,
    /// Per STM event, the symbols in that event absent from the flattened
    /// present symbols.
    pub extras: Vec<BTreeSet<String>>,
}

/// Segment `pattern` against `stm`. Returns `None` if no event in the
/// pattern shares any symbol with STM — segmentation is undefined in that
/// case and the pattern is rejected at segment time.
pub fn segment(pattern: &Pattern, stm: &Stm) -> Option<Segment> {
    let stm_tokens: BTreeSet<String> = stm.flattened_tokens().into_iter().collect();
    if stm_tokens.is_empty() {
        return None;
    }

    let matching_indices: Vec<usize> = pattern
        .events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.token_set().iter().any(|s| stm_tokens.contains(*s)))
        .map(|(i, _)| i)
        .collect();

    let (&i_first, &i_last) = match (matching_indices.first(), matching_indices.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return None,
    };

    let past = pattern.events[..i_first].to_vec();
    let present = pattern.events[i_first..=i_last].to_vec();
    let future = pattern.events[i_last + 1..].to_vec();

    let missing = present
        .iter()
        .map(|e| {
            e.token_set()
                .into_iter()
                .filter(|s| !stm_tokens.contains(*s))
                .map(String::from)
                .collect()
        })
        .collect();

    let present_tokens: BTreeSet<String> = present
        .iter()
        .flat_map(|e| e.symbols.iter().cloned())
        .collect();
    let extras = stm
        .events()
        .iter()
        .map(|e| {
            e.token_set()
                .into_iter()
                .filter(|s| !present_tokens.contains(*s))
                .map(String::from)
                .collect()
        })
        .collect();

    Some(Segment {
        past,
        present,
        future,
        missing,
        extras,
    })
}
