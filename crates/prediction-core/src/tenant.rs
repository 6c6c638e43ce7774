//! Tenant Isolator
//!
//! Derives a canonical tenant identifier from a caller-supplied node id. The
//! transformation is pure and deterministic so the same `node_id` always maps
//! to the same storage partition, across processes and restarts.

use serde::{Deserialize, Serialize};

/// Default suffix appended to every derived tenant id, per the normative
/// wire-format rule.
pub const DEFAULT_SERVICE_SUFFIX: &str = "_kato";

/// Characters replaced with `_` during tenant-id derivation, per the
/// normative wire-format rule.
const REPLACED_CHARS: &[char] = &['/', '\\', '.', '"', '$', '*', '<', '>', ':', '|', '?', '-', ' '];

/// A canonical, isolation-safe tenant identifier.
///
/// Every store call carries one of these rather than a raw `node_id`, so it
/// is impossible to accidentally pass an unsanitized caller-supplied string
/// into a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Derive a canonical tenant id from a caller-provided node identifier.
    ///
    /// Replaces every character in [`REPLACED_CHARS`] with `_`, appends
    /// `suffix`, and lowercases the result. Pure function: same input always
    /// yields the same output.
    pub fn derive(node_id: &str, suffix: &str) -> Self {
        let mut sanitized: String = node_id
            .chars()
            .map(|c| if REPLACED_CHARS.contains(&c) { '_' } else { c })
            .collect();
        sanitized.push_str(suffix);
        TenantId(sanitized.to_lowercase())
    }

    /// Derive using the default service suffix.
    pub fn derive_default(node_id: &str) -> Self {
        Self::derive(node_id, DEFAULT_SERVICE_SUFFIX)
    }

    /// Borrow the canonical string form, e.g. for use as a storage key
    /// component.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_characters() {
        let t = TenantId::derive("node/a.b\"c$d*e<f>g:h|i?j k", "_svc");
        assert_eq!(t.as_str(), "node_a_b_c_d_e_f_g_h_i_j_k_svc");
    }

    #[test]
    fn lowercases_result() {
        let t = TenantId::derive("Alice", "_svc");
        assert_eq!(t.as_str(), "alice_svc");
    }

    #[test]
    fn pure_function_same_input_same_output() {
        let a = TenantId::derive_default("bob");
        let b = TenantId::derive_default("bob");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_ids_yield_distinct_tenants() {
        let alice = TenantId::derive_default("alice");
        let bob = TenantId::derive_default("bob");
        assert_ne!(alice, bob);
    }
}
