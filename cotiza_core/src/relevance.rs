//! Token-overlap relevance between a query and a product title.
//!
//! Scoring and filtering are deliberately separate entry points: the score of
//! an empty query is 1.0, while the filter never accepts an empty query.

use crate::text::{normalize, TokenSet};
use serde::{Deserialize, Serialize};

/// Share of the query's tokens present in the title, in `[0, 1]`.
pub fn overlap_ratio(query: &str, title: &str) -> f64 {
    overlap_tokens(&normalize(query), &normalize(title))
}

/// Same as [`overlap_ratio`] for pre-computed token sets.
pub fn overlap_tokens(query: &TokenSet, title: &TokenSet) -> f64 {
    if query.is_empty() {
        return 1.0;
    }
    let shared = query.intersection(title).count();
    shared as f64 / query.len() as f64
}

/// Accept-if-above-threshold rule. An empty query is always rejected.
pub fn passes_threshold(query: &TokenSet, title: &TokenSet, min_ratio: f64) -> bool {
    if query.is_empty() {
        return false;
    }
    overlap_tokens(query, title) >= min_ratio
}

/// How a store's candidates are screened before they become hits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "min_ratio", rename_all = "snake_case")]
pub enum RelevancePolicy {
    /// The store's endpoint already returns relevant products.
    Unfiltered,
    /// Drop candidates whose overlap ratio is below the threshold.
    Threshold(f64),
}

impl RelevancePolicy {
    pub fn accepts(&self, query: &TokenSet, title: &TokenSet) -> bool {
        match self {
            RelevancePolicy::Unfiltered => true,
            RelevancePolicy::Threshold(min) => passes_threshold(query, title, *min),
        }
    }

    /// Replace the threshold, leaving unfiltered stores unfiltered.
    pub fn with_min_ratio(self, min_ratio: Option<f64>) -> Self {
        match (self, min_ratio) {
            (RelevancePolicy::Threshold(_), Some(min)) => {
                RelevancePolicy::Threshold(min.clamp(0.0, 1.0))
            }
            (policy, _) => policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_zero_overlap() {
        assert_eq!(overlap_ratio("carpeta azul", "Carpeta Azul Oficio"), 1.0);
        assert_eq!(overlap_ratio("carpeta azul", "Cuaderno Rojo"), 0.0);
    }

    #[test]
    fn partial_overlap() {
        let ratio = overlap_ratio("cuaderno universitario matematica", "Cuaderno Universitario Rhein");
        assert!((ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_query_scores_one_but_never_passes_filter() {
        assert_eq!(overlap_ratio("", "Cuaderno"), 1.0);
        assert_eq!(overlap_ratio("de la x", "Cuaderno"), 1.0);

        let empty = normalize("");
        let title = normalize("Cuaderno");
        assert!(!passes_threshold(&empty, &title, 0.0));
        assert!(!RelevancePolicy::Threshold(0.3).accepts(&empty, &title));
    }

    #[test]
    fn threshold_policy() {
        let q = normalize("goma de borrar miga");
        let t = normalize("Goma Miga Pelikan");
        // two of three query tokens
        assert!(RelevancePolicy::Threshold(0.5).accepts(&q, &t));
        assert!(!RelevancePolicy::Threshold(0.7).accepts(&q, &t));
        assert!(RelevancePolicy::Unfiltered.accepts(&q, &normalize("Tijeras")));
    }

    #[test]
    fn min_ratio_override() {
        assert_eq!(
            RelevancePolicy::Threshold(0.5).with_min_ratio(Some(0.3)),
            RelevancePolicy::Threshold(0.3)
        );
        assert_eq!(
            RelevancePolicy::Unfiltered.with_min_ratio(Some(0.3)),
            RelevancePolicy::Unfiltered
        );
        assert_eq!(
            RelevancePolicy::Threshold(0.5).with_min_ratio(Some(4.0)),
            RelevancePolicy::Threshold(1.0)
        );
    }
}
