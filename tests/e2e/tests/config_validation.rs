//! Configuration resolution journeys: layered precedence and fail-fast
//! validation, exercised end-to-end through `EnvDefaults::resolve`.

use prediction_core::config::{ConfigOverrides, EnvDefaults, FilterStageKind, RankSortAlgo, StmMode};

#[test]
fn defaults_alone_resolve_and_validate() {
    let env = EnvDefaults::default();
    let resolved = env.resolve(None, None).unwrap();
    assert_eq!(resolved.max_predictions, 100);
    assert_eq!(resolved.rank_sort_algo, RankSortAlgo::Potential);
}

#[test]
fn per_call_override_wins_over_per_session_override() {
    let env = EnvDefaults::default();
    let session = ConfigOverrides {
        stm_mode: Some(StmMode::Rolling),
        max_predictions: Some(5),
        ..Default::default()
    };
    let call = ConfigOverrides {
        max_predictions: Some(42),
        ..Default::default()
    };
    let resolved = env.resolve(Some(&session), Some(&call)).unwrap();
    assert_eq!(resolved.max_predictions, 42);
    // Session-only override still applies when the call doesn't touch it.
    assert_eq!(resolved.stm_mode, StmMode::Rolling);
}

#[test]
fn invalid_merged_minhash_params_are_rejected_at_resolve_time() {
    let env = EnvDefaults::default();
    let call = ConfigOverrides {
        minhash_bands: Some(3),
        minhash_rows: Some(7),
        minhash_num_hashes: Some(100),
        ..Default::default()
    };
    assert!(env.resolve(None, Some(&call)).is_err());
}

#[test]
fn empty_filter_pipeline_is_a_valid_override() {
    let env = EnvDefaults::default();
    let call = ConfigOverrides {
        filter_pipeline: Some(Vec::new()),
        ..Default::default()
    };
    let resolved = env.resolve(None, Some(&call)).unwrap();
    assert!(resolved.filter_pipeline.is_empty());
}

#[test]
fn custom_filter_pipeline_order_is_preserved_through_resolution() {
    let env = EnvDefaults::default();
    let call = ConfigOverrides {
        filter_pipeline: Some(vec![FilterStageKind::Jaccard, FilterStageKind::Rapidfuzz]),
        ..Default::default()
    };
    let resolved = env.resolve(None, Some(&call)).unwrap();
    assert_eq!(
        resolved.filter_pipeline,
        vec![FilterStageKind::Jaccard, FilterStageKind::Rapidfuzz]
    );
}

#[test]
fn recall_threshold_out_of_range_is_rejected() {
    let env = EnvDefaults::default();
    let call = ConfigOverrides {
        recall_threshold: Some(-0.1),
        ..Default::default()
    };
    assert!(env.resolve(None, Some(&call)).is_err());
}

#[test]
fn max_predictions_above_ceiling_is_rejected() {
    let env = EnvDefaults::default();
    let call = ConfigOverrides {
        max_predictions: Some(prediction_core::config::MAX_PREDICTIONS_CEILING + 1),
        ..Default::default()
    };
    assert!(env.resolve(None, Some(&call)).is_err());
}

#[test]
fn env_tenant_suffix_override_is_read_at_construction() {
    // SAFETY: test-only process-wide env mutation; no other test in this
    // binary reads PREDICTION_CORE_TENANT_SUFFIX concurrently within the
    // same process because cargo test runs each test file as its own binary.
    unsafe {
        std::env::set_var("PREDICTION_CORE_TENANT_SUFFIX", "_custom");
    }
    let env = EnvDefaults::from_env();
    assert_eq!(env.tenant_suffix, "_custom");
    unsafe {
        std::env::remove_var("PREDICTION_CORE_TENANT_SUFFIX");
    }
}
