//! Short-Term Memory (STM) and rolling windows
//!
//! STM is a per-session ordered sequence of events: a bounded ring when a
//! max pattern length is configured, unbounded otherwise. Rolling windows are
//! a first-class bounded-queue type used both for per-session emotive
//! trajectories and for a pattern's stored emotive profile.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::symbol::Event;

/// A fixed-size FIFO queue of the most recent `N` values, used to summarize
/// a trajectory (emotive history, etc.) without unbounded growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingWindow<T> {
    capacity: usize,
    values: VecDeque<T>,
}

impl<T> RollingWindow<T> {
    /// Create an empty window holding at most `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Push a value, evicting the oldest if the window is full.
    pub fn push(&mut self, value: T) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Current contents, oldest first.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Number of values currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Configured maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl RollingWindow<f64> {
    /// Mean, standard deviation, min, max, and count over the window's
    /// finite values, ignoring nothing (all stored values are already
    /// validated finite at insertion time by the caller).
    pub fn summary(&self) -> EmotiveSummary {
        let count = self.values.len();
        if count == 0 {
            return EmotiveSummary::default();
        }
        let sum: f64 = self.values.iter().sum();
        let mean = sum / count as f64;
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / count as f64;
        let std = variance.sqrt();
        let min = self.values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = self
            .values
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        EmotiveSummary {
            mean,
            std,
            min,
            max,
            count,
        }
    }
}

/// Aggregate statistics over an emotive's rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotiveSummary {
    /// Mean value across the window.
    pub mean: f64,
    /// Standard deviation across the window.
    pub std: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Number of values summarized.
    pub count: usize,
}

impl Default for EmotiveSummary {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
            count: 0,
        }
    }
}

/// Per-session ordered sequence of events.
///
/// Invariants: never contains empty events; mutated only by the core
/// engine's pure functions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stm {
    events: VecDeque<Event>,
    /// `0` means unbounded; otherwise a ring of at most this many events.
    max_length: usize,
}

impl Stm {
    /// Create an STM with the given ring capacity (`0` = unbounded).
    pub fn new(max_length: usize) -> Self {
        Self {
            events: VecDeque::new(),
            max_length,
        }
    }

    /// Append an event, evicting the oldest if the ring is full.
    ///
    /// No-op for an event with no symbols — the STM invariant is that it
    /// never contains empty events, so callers should not even construct one,
    /// but this is a defensive guard against the invariant being violated
    /// upstream.
    pub fn push(&mut self, event: Event) {
        if event.symbols.is_empty() {
            return;
        }
        if self.max_length > 0 && self.events.len() >= self.max_length {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Whether the ring is at its configured capacity (always `false` when
    /// unbounded).
    pub fn is_at_capacity(&self) -> bool {
        self.max_length > 0 && self.events.len() >= self.max_length
    }

    /// Clear all events (the `CLEAR` reset policy after learning).
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Keep only the most recent event (the `ROLLING` reset policy after
    /// learning).
    pub fn keep_last(&mut self) {
        if let Some(last) = self.events.pop_back() {
            self.events.clear();
            self.events.push_back(last);
        }
    }

    /// Ordered event slice.
    pub fn events(&self) -> Vec<Event> {
        self.events.iter().cloned().collect()
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the STM holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total symbol count across all events (duplicates counted).
    pub fn total_symbol_count(&self) -> usize {
        self.events.iter().map(|e| e.symbols.len()).sum()
    }

    /// Whether the STM has enough symbols to be eligible for prediction
    /// (total symbol count >= 2).
    pub fn eligible_for_prediction(&self) -> bool {
        self.total_symbol_count() >= 2
    }

    /// Flattened token multiset across all events (duplicates collapsed).
    pub fn token_multiset(&self) -> BTreeSet<String> {
        self.events
            .iter()
            .flat_map(|e| e.symbols.iter().cloned())
            .collect()
    }

    /// Flattened token list across all events, in event order
    /// (duplicates preserved).
    pub fn flattened_tokens(&self) -> Vec<String> {
        self.events
            .iter()
            .flat_map(|e| e.symbols.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(symbols: &[&str]) -> Event {
        Event::new(symbols.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn unbounded_stm_never_evicts() {
        let mut stm = Stm::new(0);
        for i in 0..100 {
            stm.push(ev(&[&i.to_string()]));
        }
        assert_eq!(stm.len(), 100);
    }

    #[test]
    fn bounded_stm_evicts_oldest() {
        let mut stm = Stm::new(2);
        stm.push(ev(&["a"]));
        stm.push(ev(&["b"]));
        stm.push(ev(&["c"]));
        assert_eq!(stm.len(), 2);
        assert_eq!(stm.events()[0].symbols, vec!["b"]);
    }

    #[test]
    fn empty_events_are_never_stored() {
        let mut stm = Stm::new(0);
        stm.push(Event::new(vec![]));
        assert!(stm.is_empty());
    }

    #[test]
    fn clear_empties_stm() {
        let mut stm = Stm::new(0);
        stm.push(ev(&["a"]));
        stm.clear();
        assert!(stm.is_empty());
    }

    #[test]
    fn keep_last_retains_only_final_event() {
        let mut stm = Stm::new(0);
        stm.push(ev(&["a"]));
        stm.push(ev(&["b"]));
        stm.keep_last();
        assert_eq!(stm.len(), 1);
        assert_eq!(stm.events()[0].symbols, vec!["b"]);
    }

    #[test]
    fn eligibility_requires_two_symbols() {
        let mut stm = Stm::new(0);
        stm.push(ev(&["a"]));
        assert!(!stm.eligible_for_prediction());
        stm.push(ev(&["b"]));
        assert!(stm.eligible_for_prediction());
    }

    #[test]
    fn rolling_window_evicts_oldest_value() {
        let mut w = RollingWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        w.push(3.0);
        w.push(4.0);
        let vals: Vec<f64> = w.values().cloned().collect();
        assert_eq!(vals, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn rolling_window_summary_stats() {
        let mut w = RollingWindow::new(5);
        for v in [1.0, 2.0, 3.0] {
            w.push(v);
        }
        let s = w.summary();
        assert_eq!(s.count, 3);
        assert!((s.mean - 2.0).abs() < 1e-9);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
    }
}
