//! Frequency-weighted similarity between lineages.
//!
//! Generalises the Jaccard index to frequency vectors: the sum of
//! element-wise minima divided by the sum of element-wise maxima. For binary
//! vectors this is exactly |A ∩ B| / |A ∪ B|.

use ndarray::ArrayView1;

/// Similarity of two gene-frequency vectors in [0, 1].
///
/// Returns `None` when both vectors are entirely zero, where the ratio is
/// undefined.
pub fn frequency_similarity(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    let (shared, union) = a
        .iter()
        .zip(b.iter())
        .fold((0.0, 0.0), |(lo, hi), (&x, &y)| (lo + x.min(y), hi + x.max(y)));

    if union > 0.0 {
        Some(shared / union)
    } else {
        None
    }
}
