//! MinHash stage: approximate Jaccard-threshold filter via LSH band
//! collision against the STM's on-demand-computed signature.

use crate::config::FilterStageKind;
use crate::error::Result;
use crate::minhash::compute_signature;
use crate::pattern::Pattern;

use super::{FilterStage, QueryContext};

pub struct MinhashStage;

impl FilterStage for MinhashStage {
    fn kind(&self) -> FilterStageKind {
        FilterStageKind::Minhash
    }

    fn apply(&self, ctx: &QueryContext<'_>, candidates: Vec<Pattern>) -> Result<Vec<Pattern>> {
        let tokens = ctx.stm.token_multiset();
        let stm_signature = compute_signature(tokens.iter().map(String::as_str), ctx.config.minhash_num_hashes);
        let stm_bands = stm_signature.lsh_bands(ctx.config.minhash_bands, ctx.config.minhash_rows);
        let stm_bands: std::collections::HashSet<&str> = stm_bands.iter().map(String::as_str).collect();

        Ok(candidates
            .into_iter()
            .filter(|p| p.lsh_bands.iter().any(|b| stm_bands.contains(b.as_str())))
            .collect())
    }
}
