//! Approximate term matching against a dictionary term set.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rapidfuzz::distance::indel;
use rayon::prelude::*;
use serde::Serialize;

/// Similarity ratio in `0.0..=100.0` based on normalized Indel distance.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    indel::normalized_similarity(a.chars(), b.chars()) * 100.0
}

/// A dictionary term accepted by the fuzzy matcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyMatch {
    pub term: String,
    pub score: f64,
}

/// Terms bucketed by character length.
///
/// The Indel ratio of strings with lengths `a` and `b` can never exceed
/// `200 * min(a, b) / (a + b)`, so only buckets whose length can still reach
/// the threshold are scored.
#[derive(Debug, Clone, Default)]
pub struct FuzzyIndex {
    by_len: BTreeMap<usize, Vec<String>>,
    len: usize,
}

impl FuzzyIndex {
    pub fn insert(&mut self, term: String) {
        let bucket = self.by_len.entry(term.chars().count()).or_default();
        bucket.push(term);
        self.len += 1;
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.by_len.values().flatten().map(String::as_str)
    }

    /// Best `limit` matches for `query` scoring at least `threshold`.
    ///
    /// Ordered by descending score, then shorter term, then lexical order.
    #[must_use]
    pub fn best_matches(&self, query: &str, threshold: f64, limit: usize) -> Vec<FuzzyMatch> {
        if limit == 0 || self.is_empty() {
            return Vec::new();
        }

        let (lo, hi) = length_window(query.chars().count(), threshold);
        let candidates: Vec<&String> = self
            .by_len
            .range(lo..=hi)
            .flat_map(|(_, terms)| terms.iter())
            .collect();

        let mut matches: Vec<FuzzyMatch> = candidates
            .into_par_iter()
            .filter_map(|term| {
                let score = similarity(query, term);
                (score >= threshold).then(|| FuzzyMatch {
                    term: term.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(compare_matches);
        matches.truncate(limit);
        matches
    }
}

impl FromIterator<String> for FuzzyIndex {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        let mut index = Self::default();
        for term in iter {
            index.insert(term);
        }
        index
    }
}

fn compare_matches(a: &FuzzyMatch, b: &FuzzyMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.term.chars().count().cmp(&b.term.chars().count()))
        .then_with(|| a.term.cmp(&b.term))
}

/// Inclusive range of candidate lengths that can reach `threshold`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn length_window(query_len: usize, threshold: f64) -> (usize, usize) {
    if threshold <= 0.0 || query_len == 0 {
        return (0, usize::MAX);
    }
    if threshold >= 200.0 {
        return (query_len, query_len);
    }
    let q = query_len as f64;
    let lo = (threshold * q / (200.0 - threshold)).floor() as usize;
    let hi = (q * (200.0 - threshold) / threshold).ceil() as usize;
    (lo, hi)
}
