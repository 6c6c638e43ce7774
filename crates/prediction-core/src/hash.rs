//! Pattern Hasher
//!
//! Computes the deterministic content identifier for a sequence of events.
//! The identifier is tenant-independent and reproducible across process
//! restarts and nodes: it is a pure function of the events alone.

use sha1::{Digest, Sha1};

use crate::symbol::Event;

/// Wire-format prefix for pattern identifiers.
pub const PATTERN_ID_PREFIX: &str = "PTRN|";

/// Number of hex characters following the prefix (SHA-1 produces 160 bits).
pub const PATTERN_ID_HEX_LEN: usize = 40;

/// Serialize an event sequence into the canonical length-prefixed byte
/// encoding the hasher consumes: for each event, its symbol count, then for
/// each symbol its byte length followed by its bytes, in stored order.
fn canonical_bytes(events: &[Event]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend((events.len() as u64).to_le_bytes());
    for event in events {
        buf.extend((event.symbols.len() as u64).to_le_bytes());
        for symbol in &event.symbols {
            let bytes = symbol.as_bytes();
            buf.extend((bytes.len() as u64).to_le_bytes());
            buf.extend(bytes);
        }
    }
    buf
}

/// Compute the `PTRN|<hex>` identifier for an event sequence.
///
/// Deterministic: identical `events` always yield an identical identifier,
/// regardless of tenant, process, or host.
pub fn pattern_identifier(events: &[Event]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_bytes(events));
    let digest = hasher.finalize();
    format!("{PATTERN_ID_PREFIX}{digest:x}")
}

/// Validate that a string is a well-formed pattern identifier: the `PTRN|`
/// prefix followed by exactly 40 lowercase hex characters.
pub fn is_valid_pattern_identifier(id: &str) -> bool {
    let Some(hex) = id.strip_prefix(PATTERN_ID_PREFIX) else {
        return false;
    };
    hex.len() == PATTERN_ID_HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(symbols: &[&str]) -> Event {
        Event::new(symbols.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn identifier_has_expected_shape() {
        let id = pattern_identifier(&[ev(&["a", "b"])]);
        assert!(id.starts_with(PATTERN_ID_PREFIX));
        assert_eq!(id.len(), PATTERN_ID_PREFIX.len() + PATTERN_ID_HEX_LEN);
        assert!(is_valid_pattern_identifier(&id));
    }

    #[test]
    fn identical_events_produce_identical_identifier() {
        let a = pattern_identifier(&[ev(&["alarm", "wake_up"]), ev(&["shower"])]);
        let b = pattern_identifier(&[ev(&["alarm", "wake_up"]), ev(&["shower"])]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_event_order_produces_different_identifier() {
        let a = pattern_identifier(&[ev(&["alarm"]), ev(&["shower"])]);
        let b = pattern_identifier(&[ev(&["shower"]), ev(&["alarm"])]);
        assert_ne!(a, b);
    }

    #[test]
    fn different_symbol_grouping_produces_different_identifier() {
        // [["a","b"]] must hash differently from [["a"],["b"]] - the
        // length-prefixed encoding must not be ambiguous across event
        // boundaries.
        let a = pattern_identifier(&[ev(&["a", "b"])]);
        let b = pattern_identifier(&[ev(&["a"]), ev(&["b"])]);
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(!is_valid_pattern_identifier("WRONG|abc"));
        assert!(!is_valid_pattern_identifier("PTRN|short"));
        assert!(!is_valid_pattern_identifier("PTRN|ABCDEF0123456789ABCDEF0123456789ABCDEF01"));
    }
}
