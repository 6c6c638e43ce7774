//! Storage layer
//!
//! Three store contracts the core depends on: an append-only, tenant-
//! partitioned [`PatternStore`]; a point-lookup [`MetadataStore`]; and a
//! [`SymbolStatsStore`]. A SQLite-backed implementation of all three lives in
//! [`sqlite`]. Every operation is tenant-scoped by construction — there is no
//! method on any trait here that does not take a `&TenantId`.

mod migrations;
pub mod sqlite;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::pattern::{Pattern, PatternMetadata, SymbolStatistics};
use crate::tenant::TenantId;

/// Storage-layer error type. Converts into [`crate::error::CoreError`] at the
/// engine boundary.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error (opening the database file, creating its directory, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Requested identifier does not exist under the given tenant.
    #[error("not found: {0}")]
    NotFound(String),
    /// A call exceeded its deadline.
    #[error("storage timeout: {0}")]
    Timeout(String),
    /// A store method was reached without a tenant id resolved. Always a
    /// programming bug upstream.
    #[error("tenant isolation violation: {0}")]
    TenantIsolationViolation(String),
    /// Failed to initialize the store (e.g. could not create its directory).
    #[error("initialization error: {0}")]
    Init(String),
    /// Failed to (de)serialize a stored value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage-layer result alias.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Pushdown filter predicates for [`PatternStore::scan`]. Every field is
/// optional; all present fields are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    /// Inclusive `[min, max]` event-length range.
    pub length_range: Option<(usize, usize)>,
    /// Tokens that must all appear in the pattern's multiset (bloom/required
    /// set pushdown).
    pub required_tokens: Option<Vec<String>>,
    /// LSH band keys; a pattern matches if it shares at least one.
    pub lsh_bands: Option<Vec<String>>,
    /// Exact first-token match.
    pub first_token: Option<String>,
    /// Exact last-token match.
    pub last_token: Option<String>,
}

/// Append-only, tenant-partitioned storage of [`Pattern`] rows.
///
/// Implementations SHOULD push `tenant_id`, `length`, and `lsh_bands`
/// predicates down to an index rather than filtering in the caller. Storage
/// errors are fatal and MUST propagate; no silent fallback to an empty
/// result is permitted.
pub trait PatternStore: Send + Sync {
    /// Idempotent on `(tenant_id, identifier)`; a re-write with the same
    /// identifier is a no-op against the `events`/identity columns but still
    /// refreshes `updated_at`.
    fn write(&self, pattern: &Pattern) -> Result<()>;

    /// Patterns under `tenant_id` matching every predicate in `filter`.
    fn scan(&self, tenant_id: &TenantId, filter: &PatternFilter) -> Result<Vec<Pattern>>;

    /// Remove every pattern under `tenant_id`.
    fn drop_tenant(&self, tenant_id: &TenantId) -> Result<()>;

    /// Total pattern count under `tenant_id`.
    fn count(&self, tenant_id: &TenantId) -> Result<u64>;

    /// Whether a pattern with `identifier` exists under `tenant_id`.
    fn exists(&self, tenant_id: &TenantId, identifier: &str) -> Result<bool>;
}

/// Point-lookup storage for [`PatternMetadata`].
pub trait MetadataStore: Send + Sync {
    /// Atomic upsert.
    fn write(&self, tenant_id: &TenantId, identifier: &str, metadata: &PatternMetadata) -> Result<()>;

    /// Atomic counter increment; returns the new frequency. Returns
    /// `NotFound` if no metadata row exists yet — callers must `write` the
    /// seeded metadata on first learn before ever calling this.
    fn increment_frequency(&self, tenant_id: &TenantId, identifier: &str) -> Result<u64>;

    /// Point read; `Ok(None)` if absent.
    fn get(&self, tenant_id: &TenantId, identifier: &str) -> Result<Option<PatternMetadata>>;

    /// Batch point read.
    fn batch_get(
        &self,
        tenant_id: &TenantId,
        identifiers: &[String],
    ) -> Result<BTreeMap<String, PatternMetadata>>;

    /// Remove every metadata row under `tenant_id`.
    fn drop_tenant(&self, tenant_id: &TenantId) -> Result<()>;
}

/// Per-symbol frequency and pattern-membership counters.
pub trait SymbolStatsStore: Send + Sync {
    /// Called for every symbol occurrence in every learned event, on every
    /// learn (including re-learns).
    fn increment_symbol_frequency(&self, tenant_id: &TenantId, symbol: &str) -> Result<()>;

    /// Called only when a pattern is newly created, once per distinct symbol
    /// in that pattern.
    fn increment_pattern_member_frequency(&self, tenant_id: &TenantId, symbol: &str) -> Result<()>;

    /// Point read; defaults to zero counters if absent.
    fn get(&self, tenant_id: &TenantId, symbol: &str) -> Result<SymbolStatistics>;

    /// Batch point read.
    fn batch_get(
        &self,
        tenant_id: &TenantId,
        symbols: &[String],
    ) -> Result<BTreeMap<String, SymbolStatistics>>;

    /// Remove every symbol-stats row under `tenant_id`.
    fn drop_tenant(&self, tenant_id: &TenantId) -> Result<()>;
}
