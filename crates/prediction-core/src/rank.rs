//! Composite ranking
//!
//! Scores each segmented match against a handful of scalar metrics, then
//! sorts the resulting predictions by whichever metric `rank_sort_algo`
//! names. `potential` is the default composite score blending all of them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::config::{EngineConfig, RankSortAlgo};
use crate::error::Result;
use crate::pattern::Pattern;
use crate::segment::{segment, Segment};
use crate::stm::{EmotiveSummary, Stm};
use crate::storage::{MetadataStore, PatternFilter, PatternStore, SymbolStatsStore};
use crate::tenant::TenantId;

/// One scored, segmented prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub pattern_name: String,
    pub past: Vec<crate::symbol::Event>,
    pub present: Vec<crate::symbol::Event>,
    pub future: Vec<crate::symbol::Event>,
    pub missing: Vec<std::collections::BTreeSet<String>>,
    pub extras: Vec<std::collections::BTreeSet<String>>,
    pub similarity: f64,
    pub evidence: f64,
    pub confidence: f64,
    pub snr: f64,
    pub fragmentation: usize,
    pub itfdf_similarity: f64,
    pub predictive_information: f64,
    pub normalized_entropy: f64,
    pub potential: f64,
    pub emotive_predictions: BTreeMap<String, EmotiveSummary>,
}

fn rank_value(p: &Prediction, algo: RankSortAlgo) -> f64 {
    match algo {
        RankSortAlgo::Potential => p.potential,
        RankSortAlgo::Similarity => p.similarity,
        RankSortAlgo::Evidence => p.evidence,
        RankSortAlgo::Confidence => p.confidence,
        RankSortAlgo::Snr => p.snr,
        RankSortAlgo::PredictiveInformation => p.predictive_information,
    }
}

/// Number of contiguous runs of STM-matching events within `present`, minus
/// one. Zero when `present` has no internal non-matching gaps.
fn fragmentation_of(present: &[crate::symbol::Event], stm_tokens: &std::collections::BTreeSet<String>) -> usize {
    let mut runs = 0usize;
    let mut in_run = false;
    for event in present {
        let matches = event.token_set().iter().any(|s| stm_tokens.contains(*s));
        if matches && !in_run {
            runs += 1;
            in_run = true;
        } else if !matches {
            in_run = false;
        }
    }
    runs.saturating_sub(1)
}

fn token_similarity(stm_tokens: &std::collections::BTreeSet<String>, present_tokens: &std::collections::BTreeSet<String>) -> f64 {
    if stm_tokens.is_empty() {
        return 0.0;
    }
    stm_tokens.intersection(present_tokens).count() as f64 / stm_tokens.len() as f64
}

fn character_similarity(stm_tokens: &[String], present_tokens: &[String]) -> f64 {
    let a = stm_tokens.join(" ");
    let b = present_tokens.join(" ");
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    normalized_levenshtein(&a, &b)
}

fn itfdf_similarity(
    tenant_id: &TenantId,
    stm_tokens: &std::collections::BTreeSet<String>,
    present_tokens: &std::collections::BTreeSet<String>,
    symbol_stats: &dyn SymbolStatsStore,
) -> Result<f64> {
    let union_size = stm_tokens.union(present_tokens).count();
    if union_size == 0 {
        return Ok(0.0);
    }
    let mut sum = 0.0;
    for token in stm_tokens.intersection(present_tokens) {
        let freq = symbol_stats.get(tenant_id, token)?.frequency;
        sum += 1.0 / (1.0 + freq as f64).ln();
    }
    Ok(sum / union_size as f64)
}

/// Fraction of patterns under `tenant_id` whose token multiset is a superset
/// of `tokens`. Used as the empirical probability estimate for
/// `predictive_information`.
fn empirical_probability(
    tenant_id: &TenantId,
    tokens: &std::collections::BTreeSet<String>,
    total_patterns: u64,
    pattern_store: &dyn PatternStore,
) -> Result<f64> {
    if total_patterns == 0 || tokens.is_empty() {
        return Ok(0.0);
    }
    let filter = PatternFilter {
        required_tokens: Some(tokens.iter().cloned().collect()),
        ..Default::default()
    };
    let matches = pattern_store.scan(tenant_id, &filter)?.len() as f64;
    Ok(matches / total_patterns as f64)
}

fn predictive_information(
    tenant_id: &TenantId,
    present_tokens: &std::collections::BTreeSet<String>,
    future_tokens: &std::collections::BTreeSet<String>,
    total_patterns: u64,
    pattern_store: &dyn PatternStore,
) -> Result<f64> {
    if present_tokens.is_empty() || future_tokens.is_empty() {
        return Ok(0.0);
    }
    let joint_tokens: std::collections::BTreeSet<String> =
        present_tokens.union(future_tokens).cloned().collect();
    let p_joint = empirical_probability(tenant_id, &joint_tokens, total_patterns, pattern_store)?;
    let p_present = empirical_probability(tenant_id, present_tokens, total_patterns, pattern_store)?;
    let p_future = empirical_probability(tenant_id, future_tokens, total_patterns, pattern_store)?;

    if p_joint == 0.0 || p_present == 0.0 || p_future == 0.0 {
        return Ok(0.0);
    }
    Ok(p_joint * (p_joint / (p_present * p_future)).log2())
}

fn normalized_entropy(
    tenant_id: &TenantId,
    present_tokens: &std::collections::BTreeSet<String>,
    symbol_stats: &dyn SymbolStatsStore,
) -> Result<f64> {
    if present_tokens.len() < 2 {
        return Ok(0.0);
    }
    let mut freqs = Vec::with_capacity(present_tokens.len());
    let mut total = 0.0;
    for token in present_tokens {
        let f = symbol_stats.get(tenant_id, token)?.frequency.max(1) as f64;
        freqs.push(f);
        total += f;
    }
    if total == 0.0 {
        return Ok(0.0);
    }
    let entropy: f64 = freqs
        .iter()
        .map(|f| {
            let p = f / total;
            -p * p.log2()
        })
        .sum();
    let max_entropy = (present_tokens.len() as f64).log2();
    if max_entropy == 0.0 {
        Ok(0.0)
    } else {
        Ok(entropy / max_entropy)
    }
}

fn emotive_predictions_for(
    tenant_id: &TenantId,
    identifier: &str,
    metadata_store: &dyn MetadataStore,
) -> Result<BTreeMap<String, EmotiveSummary>> {
    let metadata = metadata_store.get(tenant_id, identifier)?;
    Ok(metadata
        .map(|m| {
            m.emotive_profile
                .into_iter()
                .map(|(name, window)| (name, window.summary()))
                .collect()
        })
        .unwrap_or_default())
}

fn score_one(
    tenant_id: &TenantId,
    pattern: &Pattern,
    seg: Segment,
    stm: &Stm,
    config: &EngineConfig,
    total_patterns: u64,
    pattern_store: &dyn PatternStore,
    symbol_stats: &dyn SymbolStatsStore,
    metadata_store: &dyn MetadataStore,
) -> Result<Prediction> {
    let stm_tokens = stm.token_multiset();
    let present_tokens: std::collections::BTreeSet<String> = seg
        .present
        .iter()
        .flat_map(|e| e.symbols.iter().cloned())
        .collect();
    let future_tokens: std::collections::BTreeSet<String> = seg
        .future
        .iter()
        .flat_map(|e| e.symbols.iter().cloned())
        .collect();

    let similarity = if config.use_token_matching {
        token_similarity(&stm_tokens, &present_tokens)
    } else {
        character_similarity(&stm.flattened_tokens(), &present_tokens.iter().cloned().collect::<Vec<_>>())
    };

    let evidence = if pattern.events.is_empty() {
        0.0
    } else {
        seg.present.len() as f64 / pattern.events.len() as f64
    };

    let matched_in_present = stm_tokens.intersection(&present_tokens).count();
    let confidence = if present_tokens.is_empty() {
        0.0
    } else {
        matched_in_present as f64 / present_tokens.len() as f64
    };

    let extras_count: usize = seg.extras.iter().map(|e| e.len()).sum();
    let snr_denom = matched_in_present + extras_count;
    let snr = if snr_denom == 0 {
        1.0
    } else {
        matched_in_present as f64 / snr_denom as f64
    };

    let fragmentation = fragmentation_of(&seg.present, &stm_tokens);
    let itfdf = itfdf_similarity(tenant_id, &stm_tokens, &present_tokens, symbol_stats)?;
    let predictive_info = predictive_information(
        tenant_id,
        &present_tokens,
        &future_tokens,
        total_patterns,
        pattern_store,
    )?;
    let norm_entropy = normalized_entropy(tenant_id, &present_tokens, symbol_stats)?;
    let potential = (evidence + confidence) * snr + itfdf + 1.0 / (fragmentation as f64 + 1.0);

    let emotive_predictions = emotive_predictions_for(tenant_id, &pattern.identifier, metadata_store)?;

    Ok(Prediction {
        pattern_name: pattern.identifier.clone(),
        past: seg.past,
        present: seg.present,
        future: seg.future,
        missing: seg.missing,
        extras: seg.extras,
        similarity,
        evidence,
        confidence,
        snr,
        fragmentation,
        itfdf_similarity: itfdf,
        predictive_information: predictive_info,
        normalized_entropy: norm_entropy,
        potential,
        emotive_predictions,
    })
}

/// Segment, score, filter by `recall_threshold`, and sort every candidate.
/// Does not truncate to `max_predictions` — that happens in the engine,
/// after ranking.
pub fn rank(
    tenant_id: &TenantId,
    candidates: Vec<Pattern>,
    stm: &Stm,
    config: &EngineConfig,
    pattern_store: &dyn PatternStore,
    symbol_stats: &dyn SymbolStatsStore,
    metadata_store: &dyn MetadataStore,
) -> Result<Vec<Prediction>> {
    let total_patterns = pattern_store.count(tenant_id)?;
    let mut predictions = Vec::with_capacity(candidates.len());

    for pattern in &candidates {
        let Some(seg) = segment(pattern, stm) else {
            continue;
        };
        let prediction = score_one(
            tenant_id,
            pattern,
            seg,
            stm,
            config,
            total_patterns,
            pattern_store,
            symbol_stats,
            metadata_store,
        )?;
        if prediction.similarity < config.recall_threshold {
            continue;
        }
        predictions.push(prediction);
    }

    predictions.sort_by(|a, b| {
        rank_value(b, config.rank_sort_algo)
            .partial_cmp(&rank_value(a, config.rank_sort_algo))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pattern_name.cmp(&b.pattern_name))
    });

    Ok(predictions)
}
