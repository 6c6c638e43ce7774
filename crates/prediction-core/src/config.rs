//! Configuration Resolver
//!
//! Merges built-in defaults, global environment, per-session overrides, and
//! per-call overrides (later wins) into an effective [`EngineConfig`].
//! Validation is fail-fast: an invalid merged config is rejected at
//! session-open or config-update time, never silently clamped.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::minhash::{DEFAULT_BANDS, DEFAULT_NUM_HASHES, DEFAULT_ROWS};

/// STM reset policy applied immediately after a successful learn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StmMode {
    /// Empty the STM entirely.
    Clear,
    /// Keep only the most recent event.
    Rolling,
}

/// Which scalar predictions are sorted by, descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankSortAlgo {
    /// The default composite score.
    Potential,
    /// Fraction of STM symbols present in the match.
    Similarity,
    /// Fraction of the pattern observed.
    Evidence,
    /// Ratio of matched STM symbols to total present symbols.
    Confidence,
    /// Signal-to-noise ratio.
    Snr,
    /// Mutual-information-style predictive information.
    PredictiveInformation,
}

/// One named stage in the filter pipeline, in the order it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStageKind {
    /// Length-range pushdown filter.
    Length,
    /// Jaccard overlap/threshold filter.
    Jaccard,
    /// MinHash/LSH band-collision filter.
    Minhash,
    /// Bloom-filter required-token membership filter.
    Bloom,
    /// In-process fuzzy-similarity filter (rapidfuzz-style).
    Rapidfuzz,
}

/// The fully-merged, validated configuration an engine call runs under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether string symbols are sorted within each event.
    pub sort_symbols: bool,
    /// Auto-learn threshold (`0` disables auto-learn).
    pub max_pattern_length: usize,
    /// STM reset policy after learn.
    pub stm_mode: StmMode,
    /// Minimum similarity for a prediction to be returned.
    pub recall_threshold: f64,
    /// Truncation cap on returned predictions.
    pub max_predictions: usize,
    /// Which scalar ranks predictions.
    pub rank_sort_algo: RankSortAlgo,
    /// Token-level vs. character-level similarity.
    pub use_token_matching: bool,
    /// Filter execution order; empty = no filtering.
    pub filter_pipeline: Vec<FilterStageKind>,
    /// Length stage: minimum length ratio.
    pub length_min_ratio: f64,
    /// Length stage: maximum length ratio.
    pub length_max_ratio: f64,
    /// Jaccard stage: minimum Jaccard similarity.
    pub jaccard_threshold: f64,
    /// Jaccard stage: minimum raw intersection size.
    pub jaccard_min_overlap: usize,
    /// MinHash stage: minimum estimated similarity (informational; band
    /// collision is the actual predicate).
    pub minhash_threshold: f64,
    /// MinHash stage: number of LSH bands.
    pub minhash_bands: usize,
    /// MinHash stage: rows per band.
    pub minhash_rows: usize,
    /// MinHash stage: total hash functions (`bands * rows`).
    pub minhash_num_hashes: usize,
    /// Bloom stage: target false-positive rate.
    pub bloom_false_positive_rate: f64,
    /// Safety cap on a single stage's output size.
    pub max_candidates_per_stage: usize,
    /// Whether to record per-stage timing/count metrics.
    pub enable_filter_metrics: bool,
    /// Size of the rolling emotive queue, per pattern and per session.
    pub emotive_window_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sort_symbols: true,
            max_pattern_length: 0,
            stm_mode: StmMode::Clear,
            recall_threshold: 0.1,
            max_predictions: 100,
            rank_sort_algo: RankSortAlgo::Potential,
            use_token_matching: true,
            // `Minhash` and `Bloom` are deliberately left out of the default
            // order (both remain available via `filter_pipeline` overrides):
            // `Minhash`'s LSH band collision is only a probabilistic proxy
            // for the Jaccard threshold (spec §4.7.3's own retention formula,
            // `1 - (1 - j^R)^B`, is well under certainty for realistic
            // partial matches), and `Bloom`'s required-set predicate rejects
            // a candidate outright if STM carries any token the pattern
            // lacks — exactly the case spec §4.8 calls "extras" rather than
            // a mismatch, so it belongs in a pipeline only when a caller
            // truly wants "these specific tokens must be present" semantics
            // (spec §4.7.4), not in the default path every prediction runs.
            filter_pipeline: vec![
                FilterStageKind::Length,
                FilterStageKind::Jaccard,
                FilterStageKind::Rapidfuzz,
            ],
            length_min_ratio: 0.5,
            length_max_ratio: 2.0,
            jaccard_threshold: 0.3,
            jaccard_min_overlap: 2,
            minhash_threshold: 0.7,
            minhash_bands: DEFAULT_BANDS,
            minhash_rows: DEFAULT_ROWS,
            minhash_num_hashes: DEFAULT_NUM_HASHES,
            bloom_false_positive_rate: 0.01,
            max_candidates_per_stage: 100_000,
            enable_filter_metrics: true,
            emotive_window_size: 5,
        }
    }
}

/// Upper bound on `max_predictions` regardless of what a caller requests.
pub const MAX_PREDICTIONS_CEILING: usize = 10_000;

impl EngineConfig {
    /// Fail-fast validation of the merged configuration.
    pub fn validate(&self) -> Result<()> {
        if self.minhash_bands * self.minhash_rows != self.minhash_num_hashes {
            return Err(CoreError::InvalidInput(format!(
                "minhash_bands ({}) * minhash_rows ({}) must equal minhash_num_hashes ({})",
                self.minhash_bands, self.minhash_rows, self.minhash_num_hashes
            )));
        }
        if !(0.0..=1.0).contains(&self.recall_threshold) {
            return Err(CoreError::InvalidInput(
                "recall_threshold must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jaccard_threshold) {
            return Err(CoreError::InvalidInput(
                "jaccard_threshold must be in [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.bloom_false_positive_rate) || self.bloom_false_positive_rate <= 0.0
        {
            return Err(CoreError::InvalidInput(
                "bloom_false_positive_rate must be in (0, 1]".to_string(),
            ));
        }
        if self.length_min_ratio < 0.0 || self.length_max_ratio < self.length_min_ratio {
            return Err(CoreError::InvalidInput(
                "length_min_ratio must be >= 0 and <= length_max_ratio".to_string(),
            ));
        }
        if self.max_predictions == 0 || self.max_predictions > MAX_PREDICTIONS_CEILING {
            return Err(CoreError::InvalidInput(format!(
                "max_predictions must be in [1, {MAX_PREDICTIONS_CEILING}]"
            )));
        }
        if self.emotive_window_size == 0 {
            return Err(CoreError::InvalidInput(
                "emotive_window_size must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A sparse set of overrides applied on top of another config layer.
///
/// Every field is optional; `None` means "inherit from the layer below."
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub sort_symbols: Option<bool>,
    pub max_pattern_length: Option<usize>,
    pub stm_mode: Option<StmMode>,
    pub recall_threshold: Option<f64>,
    pub max_predictions: Option<usize>,
    pub rank_sort_algo: Option<RankSortAlgo>,
    pub use_token_matching: Option<bool>,
    pub filter_pipeline: Option<Vec<FilterStageKind>>,
    pub length_min_ratio: Option<f64>,
    pub length_max_ratio: Option<f64>,
    pub jaccard_threshold: Option<f64>,
    pub jaccard_min_overlap: Option<usize>,
    pub minhash_threshold: Option<f64>,
    pub minhash_bands: Option<usize>,
    pub minhash_rows: Option<usize>,
    pub minhash_num_hashes: Option<usize>,
    pub bloom_false_positive_rate: Option<f64>,
    pub max_candidates_per_stage: Option<usize>,
    pub enable_filter_metrics: Option<bool>,
    pub emotive_window_size: Option<usize>,
}

impl ConfigOverrides {
    /// Apply these overrides on top of `base`, returning a new config. Does
    /// not validate — callers merge all layers first, then validate once.
    pub fn apply(&self, base: &EngineConfig) -> EngineConfig {
        EngineConfig {
            sort_symbols: self.sort_symbols.unwrap_or(base.sort_symbols),
            max_pattern_length: self.max_pattern_length.unwrap_or(base.max_pattern_length),
            stm_mode: self.stm_mode.unwrap_or(base.stm_mode),
            recall_threshold: self.recall_threshold.unwrap_or(base.recall_threshold),
            max_predictions: self.max_predictions.unwrap_or(base.max_predictions),
            rank_sort_algo: self.rank_sort_algo.unwrap_or(base.rank_sort_algo),
            use_token_matching: self.use_token_matching.unwrap_or(base.use_token_matching),
            filter_pipeline: self
                .filter_pipeline
                .clone()
                .unwrap_or_else(|| base.filter_pipeline.clone()),
            length_min_ratio: self.length_min_ratio.unwrap_or(base.length_min_ratio),
            length_max_ratio: self.length_max_ratio.unwrap_or(base.length_max_ratio),
            jaccard_threshold: self.jaccard_threshold.unwrap_or(base.jaccard_threshold),
            jaccard_min_overlap: self
                .jaccard_min_overlap
                .unwrap_or(base.jaccard_min_overlap),
            minhash_threshold: self.minhash_threshold.unwrap_or(base.minhash_threshold),
            minhash_bands: self.minhash_bands.unwrap_or(base.minhash_bands),
            minhash_rows: self.minhash_rows.unwrap_or(base.minhash_rows),
            minhash_num_hashes: self
                .minhash_num_hashes
                .unwrap_or(base.minhash_num_hashes),
            bloom_false_positive_rate: self
                .bloom_false_positive_rate
                .unwrap_or(base.bloom_false_positive_rate),
            max_candidates_per_stage: self
                .max_candidates_per_stage
                .unwrap_or(base.max_candidates_per_stage),
            enable_filter_metrics: self
                .enable_filter_metrics
                .unwrap_or(base.enable_filter_metrics),
            emotive_window_size: self
                .emotive_window_size
                .unwrap_or(base.emotive_window_size),
        }
    }
}

/// Global environment defaults, read once at process start.
///
/// Per the "environment inputs are consumed at startup only" rule: this is
/// never re-read mid-process. Changing the service suffix or default TTL
/// requires a restart.
#[derive(Debug, Clone)]
pub struct EnvDefaults {
    /// Service suffix appended during tenant-id derivation.
    pub tenant_suffix: String,
    /// Default session TTL, in seconds.
    pub default_session_ttl_secs: u64,
    /// Default engine configuration before any session/call overrides.
    pub defaults: EngineConfig,
}

impl Default for EnvDefaults {
    fn default() -> Self {
        Self {
            tenant_suffix: crate::tenant::DEFAULT_SERVICE_SUFFIX.to_string(),
            default_session_ttl_secs: 3600,
            defaults: EngineConfig::default(),
        }
    }
}

impl EnvDefaults {
    /// Read global defaults from the process environment, falling back to
    /// built-in defaults for anything unset or unparseable.
    ///
    /// Recognized variables: `PREDICTION_CORE_TENANT_SUFFIX`,
    /// `PREDICTION_CORE_SESSION_TTL_SECS`.
    pub fn from_env() -> Self {
        let mut defaults = Self::default();
        if let Ok(suffix) = std::env::var("PREDICTION_CORE_TENANT_SUFFIX") {
            if !suffix.is_empty() {
                defaults.tenant_suffix = suffix;
            }
        }
        if let Ok(ttl) = std::env::var("PREDICTION_CORE_SESSION_TTL_SECS") {
            if let Ok(parsed) = ttl.parse() {
                defaults.default_session_ttl_secs = parsed;
            }
        }
        defaults
    }

    /// Merge session overrides and call overrides on top of these
    /// environment-seeded defaults, then validate the result.
    pub fn resolve(
        &self,
        session_overrides: Option<&ConfigOverrides>,
        call_overrides: Option<&ConfigOverrides>,
    ) -> Result<EngineConfig> {
        let mut cfg = self.defaults.clone();
        if let Some(o) = session_overrides {
            cfg = o.apply(&cfg);
        }
        if let Some(o) = call_overrides {
            cfg = o.apply(&cfg);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_minhash_params() {
        let mut cfg = EngineConfig::default();
        cfg.minhash_bands = 3;
        cfg.minhash_rows = 7;
        cfg.minhash_num_hashes = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_recall_threshold() {
        let mut cfg = EngineConfig::default();
        cfg.recall_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn precedence_later_layer_wins() {
        let env = EnvDefaults::default();
        let session = ConfigOverrides {
            recall_threshold: Some(0.2),
            ..Default::default()
        };
        let call = ConfigOverrides {
            recall_threshold: Some(0.4),
            ..Default::default()
        };
        let resolved = env.resolve(Some(&session), Some(&call)).unwrap();
        assert_eq!(resolved.recall_threshold, 0.4);
    }

    #[test]
    fn session_override_applies_without_call_override() {
        let env = EnvDefaults::default();
        let session = ConfigOverrides {
            max_predictions: Some(7),
            ..Default::default()
        };
        let resolved = env.resolve(Some(&session), None).unwrap();
        assert_eq!(resolved.max_predictions, 7);
    }

    #[test]
    fn max_predictions_ceiling_enforced() {
        let mut cfg = EngineConfig::default();
        cfg.max_predictions = MAX_PREDICTIONS_CEILING + 1;
        assert!(cfg.validate().is_err());
    }
}
