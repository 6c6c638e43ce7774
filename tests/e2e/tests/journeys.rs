//! End-to-end journeys through the stateless engine backed by a real
//! on-disk `SqliteStore`. No mocking: every test drives `observe`/`learn`/
//! `predict` exactly as a caller would.

use prediction_core::engine::{self, EngineState};
use prediction_core::storage::sqlite::SqliteStore;
use prediction_core::vector_index::HashVectorIndexer;
use prediction_core::{EngineConfig, Observation, TenantId};

fn obs(strings: &[&str]) -> Observation {
    Observation {
        strings: strings.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn temp_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("journeys.db");
    let store = SqliteStore::new(Some(path)).expect("open store");
    (dir, store)
}

fn teach(
    store: &SqliteStore,
    idx: &HashVectorIndexer,
    tenant: &TenantId,
    config: &EngineConfig,
    events: &[&[&str]],
) -> String {
    let mut state = EngineState::default();
    for symbols in events {
        state = engine::observe(state, &obs(symbols), idx, tenant, config, store, store, store)
            .expect("observe");
    }
    let (identifier, _) = engine::learn(state, tenant, config, store, store, store).expect("learn");
    identifier
}

fn query(
    store: &SqliteStore,
    idx: &HashVectorIndexer,
    tenant: &TenantId,
    config: &EngineConfig,
    events: &[&[&str]],
) -> Vec<prediction_core::Prediction> {
    let mut state = EngineState::default();
    for symbols in events {
        state = engine::observe(state, &obs(symbols), idx, tenant, config, store, store, store)
            .expect("observe");
    }
    engine::predict(&state, tenant, config, store, store, store).expect("predict")
}

/// Scenario A: a full sequence is taught, then a prefix of that sequence is
/// re-observed; the taught pattern should come back with the remainder in
/// `future`.
#[test]
fn scenario_a_simple_sequence_prediction() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-a");
    let config = EngineConfig::default();

    teach(
        &store,
        &idx,
        &tenant,
        &config,
        &[&["alarm"], &["wake_up"], &["shower"], &["coffee"]],
    );

    let predictions = query(&store, &idx, &tenant, &config, &[&["alarm"], &["wake_up"]]);
    assert!(!predictions.is_empty());
    let top = &predictions[0];
    assert!(top.future.iter().any(|e| e.symbols.contains(&"shower".to_string())));
    assert!(top.future.iter().any(|e| e.symbols.contains(&"coffee".to_string())));
    assert!(top.past.is_empty());
}

/// Scenario B: STM matches the middle of a learned sequence, so both past
/// and future should be populated around the matched present.
#[test]
fn scenario_b_partial_middle_match_has_past_and_future() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-b");
    let config = EngineConfig::default();

    teach(
        &store,
        &idx,
        &tenant,
        &config,
        &[&["alarm"], &["wake_up"], &["shower"], &["coffee"], &["commute"]],
    );

    let predictions = query(&store, &idx, &tenant, &config, &[&["shower"], &["coffee"]]);
    assert!(!predictions.is_empty());
    let top = &predictions[0];
    assert!(!top.past.is_empty());
    assert!(!top.future.is_empty());
}

/// Scenario C: STM's present event is missing a symbol the learned pattern
/// had at that position; `missing` should surface it.
#[test]
fn scenario_c_missing_symbol_is_reported() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-c");
    let mut config = EngineConfig::default();
    config.sort_symbols = true;

    teach(
        &store,
        &idx,
        &tenant,
        &config,
        &[&["alarm"], &["wake_up", "stretch"], &["coffee"]],
    );

    let predictions = query(&store, &idx, &tenant, &config, &[&["alarm"], &["wake_up"]]);
    assert!(!predictions.is_empty());
    let top = &predictions[0];
    let has_missing_stretch = top.missing.iter().any(|m| m.contains("stretch"));
    assert!(has_missing_stretch, "expected 'stretch' to be reported missing: {:?}", top.missing);
}

/// Scenario D: STM's present event carries an extra symbol the learned
/// pattern never had at that position; `extras` should surface it.
#[test]
fn scenario_d_extra_symbol_is_reported_as_anomaly() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-d");
    let config = EngineConfig::default();

    teach(&store, &idx, &tenant, &config, &[&["alarm"], &["wake_up"], &["coffee"]]);

    let predictions = query(
        &store,
        &idx,
        &tenant,
        &config,
        &[&["alarm"], &["wake_up", "unexpected_noise"]],
    );
    assert!(!predictions.is_empty());
    let top = &predictions[0];
    let has_extra = top.extras.iter().any(|e| e.contains("unexpected_noise"));
    assert!(has_extra, "expected 'unexpected_noise' to be reported as an extra: {:?}", top.extras);
}

/// Scenario E: STM with fewer than two total symbols is not eligible for
/// prediction and always returns an empty result, even against a rich
/// pattern store.
#[test]
fn scenario_e_short_stm_yields_no_predictions() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-e");
    let config = EngineConfig::default();

    teach(&store, &idx, &tenant, &config, &[&["alarm"], &["wake_up"], &["coffee"]]);

    let predictions = query(&store, &idx, &tenant, &config, &[&["alarm"]]);
    assert!(predictions.is_empty());
}

/// Re-teaching the identical sequence increments frequency rather than
/// creating a second pattern, and the frequency shows up via predictions.
#[test]
fn relearning_identical_sequence_increments_frequency_not_pattern_count() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-relearn");
    let config = EngineConfig::default();

    let id1 = teach(&store, &idx, &tenant, &config, &[&["a"], &["b"], &["c"]]);
    let id2 = teach(&store, &idx, &tenant, &config, &[&["a"], &["b"], &["c"]]);
    assert_eq!(id1, id2);

    use prediction_core::storage::PatternStore;
    assert_eq!(PatternStore::count(&store, &tenant).unwrap(), 1);
}

/// `auto_extend`-style auto-learn: once STM reaches `max_pattern_length`
/// during `observe`, a pattern is committed automatically without an
/// explicit `learn` call.
#[test]
fn auto_learn_fires_at_max_pattern_length() {
    let (_dir, store) = temp_store();
    let idx = HashVectorIndexer::default();
    let tenant = TenantId::derive_default("journey-autolearn");
    let mut config = EngineConfig::default();
    config.max_pattern_length = 2;

    let mut state = EngineState::default();
    state = engine::observe(state, &obs(&["x"]), &idx, &tenant, &config, &store, &store, &store).unwrap();
    state = engine::observe(state, &obs(&["y"]), &idx, &tenant, &config, &store, &store, &store).unwrap();

    assert!(state.stm.is_empty(), "auto-learn should clear STM under StmMode::Clear");
    use prediction_core::storage::PatternStore;
    assert_eq!(PatternStore::count(&store, &tenant).unwrap(), 1);
}
