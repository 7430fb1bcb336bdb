//! Pearson correlation of gene frequency profiles across lineages.

use log::info;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::AnalysisError;
use crate::frequency::FrequencyTable;

use super::cmp_desc_missing_last;

/// Correlation of one gene's lineage profile with the reference gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneCorrelation {
    pub gene: String,
    /// `None` when the coefficient is undefined (constant profile)
    pub pearson: Option<f64>,
}

/// True when every value equals the first up to a tolerance relative to the
/// largest magnitude. A constant like 1/3 has a non-representable mean, so its
/// computed standard deviation is tiny but not zero.
fn is_constant(values: &[f64]) -> bool {
    let Some(&first) = values.first() else {
        return true;
    };
    let scale = values.iter().fold(first.abs(), |m, v| m.max(v.abs()));
    let tolerance = scale * CONSTANT_TOLERANCE;
    values.iter().all(|v| (v - first).abs() <= tolerance)
}

const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Sample Pearson correlation coefficient.
///
/// Returns `None` for fewer than two points, mismatched lengths or a
/// zero-variance input.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 || is_constant(x) || is_constant(y) {
        return None;
    }
    let sd_x = x.iter().std_dev();
    let sd_y = y.iter().std_dev();
    if !(sd_x > 0.0 && sd_y > 0.0) {
        return None;
    }
    let r = x.iter().covariance(y.iter()) / (sd_x * sd_y);
    // Rounding can push |r| marginally past 1.
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Correlates every gene's frequency profile with `reference`'s and sorts
/// the result by coefficient, highest first, undefined coefficients last.
pub fn rank_by_correlation(
    table: &FrequencyTable,
    reference: &str,
) -> Result<Vec<GeneCorrelation>, AnalysisError> {
    let reference_profile = table.gene_profile(reference)?.to_vec();

    let mut ranked: Vec<GeneCorrelation> = table
        .frequencies
        .rows()
        .into_iter()
        .zip(table.gene_names())
        .map(|(row, gene)| GeneCorrelation {
            gene: gene.clone(),
            pearson: pearson(&reference_profile, &row.to_vec()),
        })
        .collect();

    ranked.sort_by(|a, b| cmp_desc_missing_last(a.pearson, b.pearson));

    let undefined = ranked.iter().filter(|c| c.pearson.is_none()).count();
    info!(
        "Ranked {} genes by correlation with {} ({} undefined)",
        ranked.len(),
        reference,
        undefined
    );

    Ok(ranked)
}
