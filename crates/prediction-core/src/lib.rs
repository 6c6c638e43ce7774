//! # Prediction Core
//!
//! A deterministic sequence-memory and prediction engine. Observations
//! accumulate into a per-session short-term memory (STM); learning hashes
//! STM into content-addressed patterns; prediction runs a multi-stage
//! candidate-filtering pipeline (length → Jaccard → MinHash/LSH → Bloom →
//! fuzzy similarity) over a tenant's stored patterns, segments each
//! survivor into past/present/future/missing/extras against the current
//! STM, and ranks the results.
//!
//! ## Design
//!
//! - **Stateless core engine** ([`engine`]): `observe`/`learn`/`predict` are
//!   pure functions over `(state, config, input)`. No locks, no shared
//!   mutable memory.
//! - **Session Manager** ([`session`]): the only stateful layer. Owns
//!   session records and their per-session critical section.
//! - **Per-tenant isolation** ([`tenant`]): every store call carries a
//!   derived [`tenant::TenantId`]; cross-tenant lookups are impossible by
//!   construction.
//! - **Storage** ([`storage`]): a SQLite-backed [`storage::sqlite::SqliteStore`]
//!   implements the append-only pattern store, the point-lookup metadata
//!   store, and the symbol-statistics store.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use prediction_core::{EngineState, EngineConfig, Observation, TenantId};
//! use prediction_core::storage::sqlite::SqliteStore;
//! use prediction_core::vector_index::HashVectorIndexer;
//!
//! let store = SqliteStore::in_memory()?;
//! let indexer = HashVectorIndexer::default();
//! let tenant = TenantId::derive_default("my-service");
//! let config = EngineConfig::default();
//!
//! let mut state = EngineState::default();
//! let obs = Observation { strings: vec!["alarm".into()], ..Default::default() };
//! state = prediction_core::engine::observe(state, &obs, &indexer, &tenant, &config, &store, &store, &store)?;
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hash;
pub mod minhash;
pub mod pattern;
pub mod rank;
pub mod segment;
pub mod session;
pub mod stm;
pub mod storage;
pub mod symbol;
pub mod tenant;
pub mod vector_index;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{ConfigOverrides, EngineConfig, EnvDefaults, FilterStageKind, RankSortAlgo, StmMode};
pub use engine::EngineState;
pub use error::{CoreError, Result};
pub use filter::{FilterPipeline, StageMetrics};
pub use pattern::{Pattern, PatternMetadata, SymbolStatistics};
pub use rank::Prediction;
pub use segment::Segment;
pub use session::{SessionError, SessionRecord, SessionStore};
pub use stm::{EmotiveSummary, RollingWindow, Stm};
pub use symbol::{CanonicalObservation, Event, Observation};
pub use tenant::TenantId;
pub use vector_index::{HashVectorIndexer, VectorIndexer};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        CoreError, EngineConfig, EngineState, Event, Observation, Pattern, Prediction, Result,
        SessionStore, Stm, TenantId,
    };
    pub use crate::storage::sqlite::SqliteStore;
    pub use crate::storage::{MetadataStore, PatternStore, SymbolStatsStore};
}
