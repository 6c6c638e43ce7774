//! Cross-tenant isolation: two tenants teaching overlapping symbol
//! vocabularies must never see each other's patterns, metadata, or symbol
//! statistics.

use prediction_core::engine::{self, EngineState};
use prediction_core::storage::{MetadataStore, PatternStore, SymbolStatsStore};
use prediction_core::storage::sqlite::SqliteStore;
use prediction_core::vector_index::HashVectorIndexer;
use prediction_core::{EngineConfig, Observation, TenantId};

fn obs(strings: &[&str]) -> Observation {
    Observation {
        strings: strings.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
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

#[test]
fn same_sequence_under_two_tenants_produces_isolated_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(Some(dir.path().join("isolation.db"))).unwrap();
    let idx = HashVectorIndexer::default();
    let config = EngineConfig::default();

    let alice = TenantId::derive_default("alice");
    let bob = TenantId::derive_default("bob");

    let id_alice = teach(&store, &idx, &alice, &config, &[&["alarm"], &["wake_up"]]);
    let id_bob = teach(&store, &idx, &bob, &config, &[&["alarm"], &["wake_up"]]);

    // Identifiers are content-addressed over events only, not tenant, so the
    // same sequence under two tenants hashes to the same identifier...
    assert_eq!(id_alice, id_bob);

    // ...but the underlying rows are tenant-scoped and independently counted.
    assert_eq!(PatternStore::count(&store, &alice).unwrap(), 1);
    assert_eq!(PatternStore::count(&store, &bob).unwrap(), 1);

    // Re-teaching under alice must not bump bob's frequency.
    teach(&store, &idx, &alice, &config, &[&["alarm"], &["wake_up"]]);
    let alice_meta = MetadataStore::get(&store, &alice, &id_alice).unwrap().unwrap();
    let bob_meta = MetadataStore::get(&store, &bob, &id_bob).unwrap().unwrap();
    assert_eq!(alice_meta.frequency, 2);
    assert_eq!(bob_meta.frequency, 1);
}

#[test]
fn drop_tenant_removes_only_that_tenants_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(Some(dir.path().join("isolation_drop.db"))).unwrap();
    let idx = HashVectorIndexer::default();
    let config = EngineConfig::default();

    let alice = TenantId::derive_default("alice-drop");
    let bob = TenantId::derive_default("bob-drop");

    teach(&store, &idx, &alice, &config, &[&["x"], &["y"]]);
    teach(&store, &idx, &bob, &config, &[&["x"], &["y"]]);

    PatternStore::drop_tenant(&store, &alice).unwrap();

    assert_eq!(PatternStore::count(&store, &alice).unwrap(), 0);
    assert_eq!(PatternStore::count(&store, &bob).unwrap(), 1);
}

#[test]
fn symbol_statistics_are_not_shared_across_tenants() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(Some(dir.path().join("isolation_stats.db"))).unwrap();
    let idx = HashVectorIndexer::default();
    let config = EngineConfig::default();

    let alice = TenantId::derive_default("alice-stats");
    let bob = TenantId::derive_default("bob-stats");

    teach(&store, &idx, &alice, &config, &[&["shared_symbol"], &["other"]]);

    let alice_stats = SymbolStatsStore::get(&store, &alice, "shared_symbol").unwrap();
    let bob_stats = SymbolStatsStore::get(&store, &bob, "shared_symbol").unwrap();
    assert_eq!(alice_stats.frequency, 1);
    assert_eq!(bob_stats.frequency, 0);
}

#[test]
fn predictions_never_cross_tenant_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(Some(dir.path().join("isolation_predict.db"))).unwrap();
    let idx = HashVectorIndexer::default();
    let config = EngineConfig::default();

    let alice = TenantId::derive_default("alice-predict");
    let bob = TenantId::derive_default("bob-predict");

    teach(&store, &idx, &alice, &config, &[&["only_alice_knows_this"], &["secret_follow_up"]]);

    let mut bob_state = EngineState::default();
    bob_state = engine::observe(
        bob_state,
        &obs(&["only_alice_knows_this"]),
        &idx,
        &bob,
        &config,
        &store,
        &store,
        &store,
    )
    .unwrap();
    bob_state = engine::observe(
        bob_state,
        &obs(&["irrelevant"]),
        &idx,
        &bob,
        &config,
        &store,
        &store,
        &store,
    )
    .unwrap();

    let predictions = engine::predict(&bob_state, &bob, &config, &store, &store, &store).unwrap();
    assert!(predictions.is_empty());
}
