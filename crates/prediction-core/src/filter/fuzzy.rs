//! Fuzzy-similarity stage: the last, most expensive stage. Runs entirely
//! in-process (never pushed down) and drops candidates below
//! `recall_threshold`. Ordering this stage anywhere but last would defeat
//! the entire point of the earlier cheap pushdown-friendly stages.

use crate::config::FilterStageKind;
use crate::error::Result;
use crate::pattern::Pattern;

use super::{FilterStage, QueryContext};

/// Ratio of the best bipartite match between two token sets: size of the
/// intersection over the size of the larger set. A simple, well-defined
/// token-level fuzzy score; character-level scoring (via `strsim`) happens
/// later, in the ranker, when `use_token_matching` is false.
fn token_fuzzy_ratio(a: &std::collections::BTreeSet<String>, b: &std::collections::BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / denom as f64
}

pub struct FuzzyStage;

impl FilterStage for FuzzyStage {
    fn kind(&self) -> FilterStageKind {
        FilterStageKind::Rapidfuzz
    }

    fn apply(&self, ctx: &QueryContext<'_>, candidates: Vec<Pattern>) -> Result<Vec<Pattern>> {
        let s = ctx.stm.token_multiset();
        Ok(candidates
            .into_iter()
            .filter(|p| token_fuzzy_ratio(&s, &p.token_multiset) >= ctx.config.recall_threshold)
            .collect())
    }
}
