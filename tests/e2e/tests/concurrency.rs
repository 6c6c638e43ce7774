//! Concurrency journeys: the session store's per-session critical sections
//! must let distinct sessions make progress independently, and a shared
//! `SqliteStore` must survive concurrent writers from multiple sessions.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use prediction_core::engine::{self, EngineState};
use prediction_core::session::SessionStore;
use prediction_core::storage::sqlite::SqliteStore;
use prediction_core::storage::PatternStore;
use prediction_core::vector_index::HashVectorIndexer;
use prediction_core::{EngineConfig, Observation, TenantId};

fn obs(strings: &[&str]) -> Observation {
    Observation {
        strings: strings.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

#[test]
fn concurrent_sessions_make_independent_progress() {
    let sessions = Arc::new(SessionStore::new());
    let a = sessions.open(TenantId::derive_default("concurrent-a"), Duration::from_secs(60), false);
    let b = sessions.open(TenantId::derive_default("concurrent-b"), Duration::from_secs(60), false);

    let sessions_a = Arc::clone(&sessions);
    let a_thread = a.clone();
    let handle_a = thread::spawn(move || {
        for _ in 0..50 {
            sessions_a
                .with_session(&a_thread, |record| {
                    record.state.stm.push(prediction_core::Event::new(vec!["x".to_string()]));
                })
                .unwrap();
        }
    });

    let sessions_b = Arc::clone(&sessions);
    let b_thread = b.clone();
    let handle_b = thread::spawn(move || {
        for _ in 0..50 {
            sessions_b
                .with_session(&b_thread, |record| {
                    record.state.stm.push(prediction_core::Event::new(vec!["y".to_string()]));
                })
                .unwrap();
        }
    });

    handle_a.join().unwrap();
    handle_b.join().unwrap();

    let len_a = sessions.with_session(&a, |r| r.state.stm.len()).unwrap();
    let len_b = sessions.with_session(&b, |r| r.state.stm.len()).unwrap();
    assert!(len_a > 0);
    assert!(len_b > 0);
}

#[test]
fn concurrent_learners_against_shared_store_do_not_corrupt_counts() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::new(Some(dir.path().join("concurrency.db"))).unwrap());
    let tenant = TenantId::derive_default("concurrency-shared");

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let tenant = tenant.clone();
        handles.push(thread::spawn(move || {
            let idx = HashVectorIndexer::default();
            let config = EngineConfig::default();
            let sym_a = format!("writer_{i}_a");
            let sym_b = format!("writer_{i}_b");
            let mut state = EngineState::default();
            state = engine::observe(
                state,
                &obs(&[sym_a.as_str()]),
                &idx,
                &tenant,
                &config,
                store.as_ref(),
                store.as_ref(),
                store.as_ref(),
            )
            .unwrap();
            state = engine::observe(
                state,
                &obs(&[sym_b.as_str()]),
                &idx,
                &tenant,
                &config,
                store.as_ref(),
                store.as_ref(),
                store.as_ref(),
            )
            .unwrap();
            engine::learn(state, &tenant, &config, store.as_ref(), store.as_ref(), store.as_ref()).unwrap();
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(PatternStore::count(store.as_ref(), &tenant).unwrap(), 8);
}

#[test]
fn expired_session_is_rejected_even_under_concurrent_access() {
    let sessions = Arc::new(SessionStore::new());
    let id = sessions.open(TenantId::derive_default("concurrent-expiry"), Duration::from_millis(5), false);
    thread::sleep(Duration::from_millis(25));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let sessions = Arc::clone(&sessions);
        let id = id.clone();
        handles.push(thread::spawn(move || sessions.with_session(&id, |_| ()).is_err()));
    }
    for h in handles {
        assert!(h.join().unwrap());
    }
}
