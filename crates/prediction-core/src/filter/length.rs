//! Length stage: range filter pushed down to the pattern store in spirit,
//! applied in-process here against the pre-fetched candidate set.

use crate::config::FilterStageKind;
use crate::error::Result;
use crate::pattern::Pattern;

use super::{FilterStage, QueryContext};

pub struct LengthStage;

impl FilterStage for LengthStage {
    fn kind(&self) -> FilterStageKind {
        FilterStageKind::Length
    }

    fn apply(&self, ctx: &QueryContext<'_>, candidates: Vec<Pattern>) -> Result<Vec<Pattern>> {
        let l = ctx.stm.len() as f64;
        let min_len = (l * ctx.config.length_min_ratio).ceil() as usize;
        let max_len = (l * ctx.config.length_max_ratio).floor() as usize;
        Ok(candidates
            .into_iter()
            .filter(|p| p.length >= min_len && p.length <= max_len)
            .collect())
    }
}
