//! Statistical analysis module.
//!
//! Correlation of lineage-frequency profiles and the frequency-weighted
//! similarity used to compare lineages.

pub mod correlation;
pub mod similarity;

pub use correlation::{pearson, rank_by_correlation, GeneCorrelation};
pub use similarity::frequency_similarity;

use std::cmp::Ordering;

/// Descending order for optional scores, with missing values last.
pub(crate) fn cmp_desc_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
