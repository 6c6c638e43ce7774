//! Bloom stage: cheap early-reject membership test against a pattern's
//! required-token set, backed by a real Bloom filter rather than a
//! hand-rolled bit array.

use probabilistic_collections::bloom::BloomFilter;

use crate::config::FilterStageKind;
use crate::error::Result;
use crate::pattern::Pattern;

use super::{FilterStage, QueryContext};

pub struct BloomStage;

impl FilterStage for BloomStage {
    fn kind(&self) -> FilterStageKind {
        FilterStageKind::Bloom
    }

    fn apply(&self, ctx: &QueryContext<'_>, candidates: Vec<Pattern>) -> Result<Vec<Pattern>> {
        let required = ctx.stm.token_multiset();
        if required.is_empty() {
            return Ok(candidates);
        }

        Ok(candidates
            .into_iter()
            .filter(|p| {
                let mut filter: BloomFilter<String> =
                    BloomFilter::new(p.token_multiset.len().max(1), ctx.config.bloom_false_positive_rate);
                for token in &p.token_multiset {
                    filter.insert(token);
                }
                required.iter().all(|token| filter.contains(token))
            })
            .collect())
    }
}
