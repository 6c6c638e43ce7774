//! Vector Indexer (collaborator contract)
//!
//! The numeric vector-similarity backend is an external collaborator (an
//! approximate-nearest-neighbor service, typically). The core only depends on
//! two properties of it: determinism and per-tenant isolation. This module
//! defines the contract and ships a deterministic hash-based stand-in that
//! satisfies both, suitable for tests and for deployments that have not wired
//! up a real ANN cluster yet.

use sha1::{Digest, Sha1};

use crate::tenant::TenantId;

/// Wire-format prefix for vector-derived synthetic symbols.
pub const VECTOR_SYMBOL_PREFIX: &str = "VCTR|";

/// Default vector dimensionality the hash stand-in truncates/pads to.
pub const DEFAULT_VECTOR_DIMENSIONS: usize = 768;

/// Contract for resolving a numeric vector to a synthetic symbol.
///
/// Implementations MUST be deterministic: the same vector under the same
/// tenant must produce the same symbol across calls and process restarts.
/// They MUST also be tenant-isolated: the same vector under two different
/// tenants is not required to (and by the hash stand-in, will not) produce
/// the same symbol, but a real ANN-backed implementation is free to share
/// cluster ids across tenants as long as it documents that deviation.
pub trait VectorIndexer: Send + Sync {
    /// Resolve `vector` to a synthetic symbol for `tenant`.
    fn index(&self, tenant: &TenantId, vector: &[f32]) -> String;
}

/// Deterministic hash-based stand-in for a real vector index.
///
/// Hashes the vector's bit representation, truncated to `dimensions`, mixed
/// with the tenant id, into a `VCTR|<hex>` symbol. This is *not* an
/// approximate-nearest-neighbor index — two similar-but-unequal vectors hash
/// to unrelated symbols — it exists purely to satisfy the determinism and
/// isolation contract for callers that have not wired in a real ANN backend.
#[derive(Debug, Clone)]
pub struct HashVectorIndexer {
    dimensions: usize,
}

impl HashVectorIndexer {
    /// Create an indexer that considers the first `dimensions` components of
    /// any vector it is given.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashVectorIndexer {
    fn default() -> Self {
        Self::new(DEFAULT_VECTOR_DIMENSIONS)
    }
}

impl VectorIndexer for HashVectorIndexer {
    fn index(&self, tenant: &TenantId, vector: &[f32]) -> String {
        let mut hasher = Sha1::new();
        hasher.update(tenant.as_str().as_bytes());
        hasher.update(b"|");
        let take = vector.len().min(self.dimensions);
        for v in &vector[..take] {
            hasher.update(v.to_bits().to_le_bytes());
        }
        let digest = hasher.finalize();
        format!("{VECTOR_SYMBOL_PREFIX}{digest:x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_vector_same_tenant_is_deterministic() {
        let idx = HashVectorIndexer::default();
        let tenant = TenantId::derive_default("alice");
        let v = vec![0.1f32, 0.2, 0.3];
        assert_eq!(idx.index(&tenant, &v), idx.index(&tenant, &v));
    }

    #[test]
    fn different_tenants_yield_different_symbols() {
        let idx = HashVectorIndexer::default();
        let alice = TenantId::derive_default("alice");
        let bob = TenantId::derive_default("bob");
        let v = vec![0.1f32, 0.2, 0.3];
        assert_ne!(idx.index(&alice, &v), idx.index(&bob, &v));
    }

    #[test]
    fn wire_format_has_vctr_prefix() {
        let idx = HashVectorIndexer::default();
        let tenant = TenantId::derive_default("alice");
        let sym = idx.index(&tenant, &[1.0, 2.0]);
        assert!(sym.starts_with(VECTOR_SYMBOL_PREFIX));
    }
}
