//! Core Engine (stateless)
//!
//! `observe`, `learn`, and `predict` are pure functions: no instance state,
//! no locks, no shared mutable memory. Given the same `(state, config,
//! input)` they always return the same `(new_state, output)`. The Session
//! Manager is the only caller that holds state across invocations; it loads
//! a session's [`EngineState`], calls these functions, and persists the
//! result.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::{EngineConfig, StmMode};
use crate::error::{CoreError, Result};
use crate::filter::FilterPipeline;
use crate::pattern::{Pattern, PatternMetadata};
use crate::rank::{rank, Prediction};
use crate::stm::{RollingWindow, Stm};
use crate::storage::{MetadataStore, PatternStore, SymbolStatsStore};
use crate::symbol::{canonicalize, Observation};
use crate::tenant::TenantId;
use crate::vector_index::VectorIndexer;

/// Everything the engine's pure functions read and write across calls: the
/// STM itself, a per-emotive rolling window, and an accumulator of observed
/// metadata values. Owned by a session; never shared or locked by the
/// engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub stm: Stm,
    pub emotive_window: HashMap<String, RollingWindow<f64>>,
    pub metadata_accumulator: BTreeMap<String, BTreeSet<String>>,
}

/// Append one observation to STM, accumulate its emotives/metadata, and
/// auto-learn if the STM has reached `max_pattern_length`.
///
/// Returns the new state. If auto-learn fires, the learned pattern is
/// written through `store`/`metadata_store`/`symbol_stats` exactly as an
/// explicit `learn` call would.
#[instrument(skip(state, obs, indexer, tenant_id, config, store, metadata_store, symbol_stats))]
#[allow(clippy::too_many_arguments)]
pub fn observe(
    mut state: EngineState,
    obs: &Observation,
    indexer: &dyn VectorIndexer,
    tenant_id: &TenantId,
    config: &EngineConfig,
    store: &dyn PatternStore,
    metadata_store: &dyn MetadataStore,
    symbol_stats: &dyn SymbolStatsStore,
) -> Result<EngineState> {
    let canon = canonicalize(obs, indexer, tenant_id, config.sort_symbols);

    if let Some(event) = canon.event {
        state.stm.push(event);
    }
    for (name, value) in &canon.emotives {
        if !value.is_finite() {
            return Err(CoreError::InvalidInput(format!(
                "emotive '{name}' value must be finite, got {value}"
            )));
        }
        state
            .emotive_window
            .entry(name.clone())
            .or_insert_with(|| RollingWindow::new(config.emotive_window_size))
            .push(*value);
    }
    for (key, value) in &canon.metadata {
        state
            .metadata_accumulator
            .entry(key.clone())
            .or_default()
            .insert(value.clone());
    }

    if config.max_pattern_length > 0 && state.stm.len() >= config.max_pattern_length {
        let (_, new_state) = learn(state, tenant_id, config, store, metadata_store, symbol_stats)?;
        state = new_state;
    }

    Ok(state)
}

/// Canonicalize-and-hash the current STM into a pattern, write or update it
/// in storage, and reset STM per `config.stm_mode`.
#[instrument(skip(state, tenant_id, config, store, metadata_store, symbol_stats))]
pub fn learn(
    mut state: EngineState,
    tenant_id: &TenantId,
    config: &EngineConfig,
    store: &dyn PatternStore,
    metadata_store: &dyn MetadataStore,
    symbol_stats: &dyn SymbolStatsStore,
) -> Result<(String, EngineState)> {
    if state.stm.is_empty() {
        return Err(CoreError::InvalidInput("cannot learn from an empty STM".to_string()));
    }

    let events = state.stm.events();
    let now = chrono::Utc::now();
    let pattern = Pattern::build(
        tenant_id.clone(),
        events,
        config.minhash_num_hashes,
        config.minhash_bands,
        config.minhash_rows,
        now,
    );
    let identifier = pattern.identifier.clone();

    let emotives: BTreeMap<String, f64> = state
        .emotive_window
        .iter()
        .filter_map(|(name, window)| window.values().last().copied().map(|v| (name.clone(), v)))
        .collect();
    let metadata_snapshot: BTreeMap<String, String> = state
        .metadata_accumulator
        .iter()
        .filter_map(|(k, vs)| vs.iter().next().cloned().map(|v| (k.clone(), v)))
        .collect();

    // Every symbol occurrence across every event bumps `frequency`, including
    // duplicates within or across events (spec §4.6); `token_multiset` is
    // deduplicated and only drives `pattern_member_frequency`, which counts
    // distinct patterns a symbol appears in, not occurrences.
    let symbol_occurrences = pattern.events.iter().flat_map(|e| e.symbols.iter());

    let existing = store.exists(tenant_id, &identifier)?;
    if existing {
        let new_frequency = metadata_store.increment_frequency(tenant_id, &identifier)?;
        if let Some(mut meta) = metadata_store.get(tenant_id, &identifier)? {
            meta.frequency = new_frequency;
            meta.merge_relearn(&emotives, &metadata_snapshot, config.emotive_window_size);
            metadata_store.write(tenant_id, &identifier, &meta)?;
        }
        for token in symbol_occurrences {
            symbol_stats.increment_symbol_frequency(tenant_id, token)?;
        }
    } else {
        store.write(&pattern)?;
        let meta = PatternMetadata::seed(&emotives, &metadata_snapshot, config.emotive_window_size);
        metadata_store.write(tenant_id, &identifier, &meta)?;
        for token in symbol_occurrences {
            symbol_stats.increment_symbol_frequency(tenant_id, token)?;
        }
        for token in &pattern.token_multiset {
            symbol_stats.increment_pattern_member_frequency(tenant_id, token)?;
        }
    }

    match config.stm_mode {
        StmMode::Clear => state.stm.clear(),
        StmMode::Rolling => state.stm.keep_last(),
    }

    Ok((identifier, state))
}

/// Run the filter pipeline, segment and score every surviving candidate,
/// and return the ranked, truncated predictions. Does not mutate state.
#[instrument(skip(state, tenant_id, config, store, symbol_stats, metadata_store))]
pub fn predict(
    state: &EngineState,
    tenant_id: &TenantId,
    config: &EngineConfig,
    store: &dyn PatternStore,
    symbol_stats: &dyn SymbolStatsStore,
    metadata_store: &dyn MetadataStore,
) -> Result<Vec<Prediction>> {
    if !state.stm.eligible_for_prediction() {
        return Ok(Vec::new());
    }

    let pipeline = FilterPipeline::build(config);
    let (candidates, _metrics) = pipeline.run(store, tenant_id, &state.stm, config, None)?;

    let mut predictions = rank(
        tenant_id,
        candidates,
        &state.stm,
        config,
        store,
        symbol_stats,
        metadata_store,
    )?;
    predictions.truncate(config.max_predictions);
    Ok(predictions)
}
