//! RRF (Reciprocal Rank Fusion) for hybrid search
//!
//! Each source contributes `weight / (k + rank)` for every document it
//! ranks. Only rank positions matter, so lexical and semantic scores never
//! have to be put on a common scale.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HsError, Result};

/// Default RRF damping constant.
pub const DEFAULT_RRF_K: u32 = 60;

/// Document identifier in the corpus.
pub type DocId = i64;

/// Reciprocal Rank Fusion parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrfConfig {
    /// K parameter (default: 60). Larger values flatten the gap between
    /// top-ranked and lower-ranked documents.
    pub k: u32,
    /// Weight for lexical (full-text) results
    pub lexical_weight: f64,
    /// Weight for semantic (embedding) results
    pub semantic_weight: f64,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            lexical_weight: 1.0,
            semantic_weight: 1.0,
        }
    }
}

impl RrfConfig {
    /// Reject parameters outside the fusion contract.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(HsError::InvalidArgument("rrf k must be > 0".to_string()));
        }
        for (name, weight) in [
            ("lexical_weight", self.lexical_weight),
            ("semantic_weight", self.semantic_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(HsError::InvalidArgument(format!(
                    "{name} must be a finite non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

/// A document's 1-based position within one source ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankedItem {
    pub doc_id: DocId,
    pub rank: u32,
}

impl RankedItem {
    #[must_use]
    pub const fn new(doc_id: DocId, rank: u32) -> Self {
        Self { doc_id, rank }
    }
}

/// Assign 1-based ranks to ids already ordered best-first.
#[must_use]
pub fn ranked_from_ids(ids: impl IntoIterator<Item = DocId>) -> Vec<RankedItem> {
    ids.into_iter()
        .zip(1u32..)
        .map(|(doc_id, rank)| RankedItem::new(doc_id, rank))
        .collect()
}

/// Fused ranking entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub doc_id: DocId,
    pub score: f64,
    /// Rank in the lexical list, if the document appeared there
    pub lexical_rank: Option<u32>,
    /// Rank in the semantic list, if the document appeared there
    pub semantic_rank: Option<u32>,
}

#[derive(Default)]
struct Accumulator {
    lexical_rank: Option<u32>,
    semantic_rank: Option<u32>,
}

/// Fuse a lexical and a semantic ranking.
///
/// Results are sorted by descending score with ties broken by ascending
/// `doc_id`, and truncated to `limit`. A document listed more than once by
/// the same source counts once, at its best rank.
pub fn fuse(
    lexical: &[RankedItem],
    semantic: &[RankedItem],
    config: &RrfConfig,
    limit: usize,
) -> Result<Vec<FusedResult>> {
    if limit == 0 {
        return Err(HsError::InvalidArgument("limit must be > 0".to_string()));
    }
    config.validate()?;

    let mut docs: HashMap<DocId, Accumulator> = HashMap::new();
    for (items, is_lexical) in [(lexical, true), (semantic, false)] {
        for item in items {
            if item.rank == 0 {
                return Err(HsError::InvalidArgument(format!(
                    "rank of document {} must be >= 1",
                    item.doc_id
                )));
            }
            let acc = docs.entry(item.doc_id).or_default();
            let slot = if is_lexical {
                &mut acc.lexical_rank
            } else {
                &mut acc.semantic_rank
            };
            *slot = Some(slot.map_or(item.rank, |r| r.min(item.rank)));
        }
    }

    let k = f64::from(config.k);
    let contribution =
        |weight: f64, rank: Option<u32>| rank.map_or(0.0, |r| weight / (k + f64::from(r)));

    let mut results: Vec<FusedResult> = docs
        .into_iter()
        .map(|(doc_id, acc)| FusedResult {
            doc_id,
            score: contribution(config.lexical_weight, acc.lexical_rank)
                + contribution(config.semantic_weight, acc.semantic_rank),
            lexical_rank: acc.lexical_rank,
            semantic_rank: acc.semantic_rank,
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    results.truncate(limit);

    debug!(
        lexical = lexical.len(),
        semantic = semantic.len(),
        fused = results.len(),
        k = config.k,
        "rrf fusion complete"
    );
    Ok(results)
}

/// Fuse two id lists ordered best-first.
pub fn fuse_ids(
    lexical: &[DocId],
    semantic: &[DocId],
    config: &RrfConfig,
    limit: usize,
) -> Result<Vec<FusedResult>> {
    fuse(
        &ranked_from_ids(lexical.iter().copied()),
        &ranked_from_ids(semantic.iter().copied()),
        config,
        limit,
    )
}
