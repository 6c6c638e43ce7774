//! Candidate-filtering pipeline
//!
//! An ordered, configurable sequence of stages that whittles "every pattern
//! stored under this tenant" down to a small candidate set before the
//! (expensive) segmenter and ranker ever run. Each stage consumes the
//! previous stage's output and emits a smaller one; an empty pipeline is a
//! no-op that hands every stored pattern straight through.

mod bloom;
mod fuzzy;
mod jaccard;
mod length;
mod minhash_stage;

use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::config::{EngineConfig, FilterStageKind};
use crate::error::{CoreError, Result};
use crate::pattern::Pattern;
use crate::stm::Stm;
use crate::storage::PatternStore;
use crate::tenant::TenantId;

pub use bloom::BloomStage;
pub use fuzzy::FuzzyStage;
pub use jaccard::JaccardStage;
pub use length::LengthStage;
pub use minhash_stage::MinhashStage;

/// Per-stage query context derived from the current STM, computed once
/// before the pipeline runs and shared read-only across every stage.
pub struct QueryContext<'a> {
    pub stm: &'a Stm,
    pub config: &'a EngineConfig,
}

/// Timing and count bookkeeping for one stage's execution.
#[derive(Debug, Clone, Copy)]
pub struct StageMetrics {
    pub stage: FilterStageKind,
    pub elapsed: Duration,
    pub input_count: usize,
    pub output_count: usize,
    pub truncated: bool,
}

/// A single candidate-reducing stage.
pub trait FilterStage: Send + Sync {
    /// Which named stage this is, for metrics and config lookups.
    fn kind(&self) -> FilterStageKind;

    /// Narrow `candidates` to those passing this stage's predicate. Stages
    /// that can push their predicate down to the store (length, Jaccard,
    /// MinHash, Bloom) receive the full pre-fetched candidate set here
    /// regardless — pushdown happens inside [`FilterPipeline::run`] via the
    /// store's `scan`, not inside individual stage `apply` calls, so that
    /// every stage has a uniform in-process interface and stage ordering is
    /// exactly what the config says.
    fn apply(&self, ctx: &QueryContext<'_>, candidates: Vec<Pattern>) -> Result<Vec<Pattern>>;
}

/// Deterministically truncate `candidates` to at most `cap` entries: highest
/// estimated pre-score wins, ties broken by identifier ascending.
fn truncate_deterministic(
    mut candidates: Vec<Pattern>,
    cap: usize,
    pre_score: impl Fn(&Pattern) -> f64,
) -> (Vec<Pattern>, bool) {
    if candidates.len() <= cap {
        return (candidates, false);
    }
    candidates.sort_by(|a, b| {
        pre_score(b)
            .partial_cmp(&pre_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    candidates.truncate(cap);
    (candidates, true)
}

/// An ordered sequence of filter stages built from [`EngineConfig::filter_pipeline`].
pub struct FilterPipeline {
    stages: Vec<Box<dyn FilterStage>>,
}

impl FilterPipeline {
    /// Build the pipeline's stage list from config, in configured order.
    pub fn build(config: &EngineConfig) -> Self {
        let stages = config
            .filter_pipeline
            .iter()
            .map(|kind| -> Box<dyn FilterStage> {
                match kind {
                    FilterStageKind::Length => Box::new(LengthStage),
                    FilterStageKind::Jaccard => Box::new(JaccardStage),
                    FilterStageKind::Minhash => Box::new(MinhashStage),
                    FilterStageKind::Bloom => Box::new(BloomStage),
                    FilterStageKind::Rapidfuzz => Box::new(FuzzyStage),
                }
            })
            .collect();
        Self { stages }
    }

    /// Run every stage in order, starting from every pattern stored under
    /// `tenant_id`. Stops early with `PartialResults` if `deadline` elapses
    /// after at least one stage has completed.
    #[instrument(skip(self, store, stm, config))]
    pub fn run(
        &self,
        store: &dyn PatternStore,
        tenant_id: &TenantId,
        stm: &Stm,
        config: &EngineConfig,
        deadline: Option<Instant>,
    ) -> Result<(Vec<Pattern>, Vec<StageMetrics>)> {
        let mut candidates = store.scan(tenant_id, &crate::storage::PatternFilter::default())?;
        let mut metrics = Vec::with_capacity(self.stages.len());
        let ctx = QueryContext { stm, config };

        for stage in &self.stages {
            let started = Instant::now();
            let input_count = candidates.len();
            candidates = stage.apply(&ctx, candidates)?;

            let (truncated_candidates, truncated) = truncate_deterministic(
                candidates,
                config.max_candidates_per_stage,
                |p| p.token_multiset.len() as f64,
            );
            candidates = truncated_candidates;
            let output_count = candidates.len();
            let elapsed = started.elapsed();

            if config.enable_filter_metrics {
                debug!(
                    stage = ?stage.kind(),
                    input_count,
                    output_count,
                    truncated,
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "filter stage completed"
                );
            }
            metrics.push(StageMetrics {
                stage: stage.kind(),
                elapsed,
                input_count,
                output_count,
                truncated,
            });

            if let Some(deadline) = deadline {
                if Instant::now() > deadline && !metrics.is_empty() {
                    return Err(CoreError::PartialResults {
                        stage: format!("{:?}", stage.kind()),
                        candidates: candidates.len(),
                    });
                }
            }
        }

        Ok((candidates, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Event;
    use chrono::Utc;

    fn pattern_with_tokens(tokens: &[&str]) -> Pattern {
        Pattern::build(
            TenantId::derive_default("t1"),
            vec![Event::new(tokens.iter().map(|s| s.to_string()).collect())],
            20,
            4,
            5,
            Utc::now(),
        )
    }

    #[test]
    fn truncate_keeps_highest_scored_and_breaks_ties_by_identifier() {
        let patterns = vec![
            pattern_with_tokens(&["a"]),
            pattern_with_tokens(&["a", "b"]),
            pattern_with_tokens(&["a", "b", "c"]),
        ];
        let (kept, truncated) = truncate_deterministic(patterns, 2, |p| p.token_multiset.len() as f64);
        assert!(truncated);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].token_multiset.len(), 3);
    }

    #[test]
    fn truncate_is_noop_under_cap() {
        let patterns = vec![pattern_with_tokens(&["a"])];
        let (kept, truncated) = truncate_deterministic(patterns, 10, |p| p.token_multiset.len() as f64);
        assert!(!truncated);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let mut config = EngineConfig::default();
        config.filter_pipeline = vec![];
        let pipeline = FilterPipeline::build(&config);
        assert!(pipeline.stages.is_empty());
    }
}
