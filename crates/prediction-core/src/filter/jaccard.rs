//! Jaccard stage: raw overlap size and Jaccard-ratio threshold against the
//! STM token multiset.

use crate::config::FilterStageKind;
use crate::error::Result;
use crate::pattern::Pattern;

use super::{FilterStage, QueryContext};

pub struct JaccardStage;

impl FilterStage for JaccardStage {
    fn kind(&self) -> FilterStageKind {
        FilterStageKind::Jaccard
    }

    fn apply(&self, ctx: &QueryContext<'_>, candidates: Vec<Pattern>) -> Result<Vec<Pattern>> {
        let s = ctx.stm.token_multiset();
        Ok(candidates
            .into_iter()
            .filter(|p| {
                let intersection = s.intersection(&p.token_multiset).count();
                if intersection < ctx.config.jaccard_min_overlap {
                    return false;
                }
                let union = s.union(&p.token_multiset).count();
                if union == 0 {
                    return false;
                }
                (intersection as f64 / union as f64) >= ctx.config.jaccard_threshold
            })
            .collect())
    }
}
