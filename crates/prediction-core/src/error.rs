//! Crate-wide error taxonomy
//!
//! A single enum covering every failure mode the core can surface, matching
//! the taxonomy (not necessarily the exact variant names) of the error design
//! section of the specification this crate implements. Component-local error
//! types (`StorageError`, `SessionError`) convert into `CoreError` via `From`
//! so callers only ever need to match on one type.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The complete error taxonomy for the prediction core.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed observation, unknown config key, invalid MinHash band/row
    /// product, STM too short for the requested operation, a non-finite
    /// emotive scalar, or a vector of the wrong dimensionality.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session existed but its TTL has elapsed.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// No session exists under the given identifier.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A store operation was attempted without a resolved tenant id. This is
    /// always a programming bug in the calling layer, never a user error.
    #[error("tenant isolation violation: {0}")]
    TenantIsolationViolation(String),

    /// A store is unreachable or returned an unrecoverable I/O error. Never
    /// silently substituted with an empty result.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A store call exceeded its deadline.
    #[error("storage timeout: {0}")]
    StorageTimeout(String),

    /// The filter pipeline's cumulative deadline was exceeded after at least
    /// one stage completed. Carries the partial candidate count for the
    /// caller's own logging; the candidates themselves travel out-of-band via
    /// the call site that raised this.
    #[error("partial results: pipeline deadline exceeded after stage {stage} ({candidates} candidates retained)")]
    PartialResults {
        /// Name of the last stage that completed before the deadline.
        stage: String,
        /// Number of candidates retained at that point.
        candidates: usize,
    },

    /// An internal invariant was violated (e.g. a re-read pattern's hash no
    /// longer matches its identifier). Always fatal; always logged with full
    /// context at the call site before propagating.
    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::StorageUnavailable(e.to_string())
    }
}

impl From<crate::storage::StorageError> for CoreError {
    fn from(e: crate::storage::StorageError) -> Self {
        match e {
            crate::storage::StorageError::TenantIsolationViolation(m) => {
                CoreError::TenantIsolationViolation(m)
            }
            crate::storage::StorageError::NotFound(m) => CoreError::InvalidInput(m),
            crate::storage::StorageError::Timeout(m) => CoreError::StorageTimeout(m),
            other => CoreError::StorageUnavailable(other.to_string()),
        }
    }
}

impl From<crate::session::SessionError> for CoreError {
    fn from(e: crate::session::SessionError) -> Self {
        match e {
            crate::session::SessionError::Expired(id) => CoreError::SessionExpired(id),
            crate::session::SessionError::NotFound(id) => CoreError::SessionNotFound(id),
            crate::session::SessionError::InvalidConfig(m) => CoreError::InvalidInput(m),
        }
    }
}
