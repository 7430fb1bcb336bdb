//! Gene name normalization and duplicate aggregation.
//!
//! Pangenome tools split paralogs and fragments into numbered variants
//! (`lsrB`, `lsrB_1`, `lsrB_1_1`, ...) and give genes of unknown function
//! placeholder names such as `group_1234`. Before frequencies are computed the
//! matrix is reduced to one row per canonical gene name:
//!
//! 1. Drop explicitly excluded variant rows.
//! 2. Drop rows whose identifier contains the unknown-function marker.
//! 3. Strip the variant suffix (everything from the first `_`).
//! 4. Sum rows sharing a canonical name and clip the result to 1.

use indexmap::IndexMap;
use log::{info, warn};
use ndarray::{Array1, Array2};

use crate::presence::PresenceMatrix;

/// Options controlling which rows survive normalization.
#[derive(Debug, Clone)]
pub struct NameNormalization {
    /// Substring marking genes of unknown function
    pub unknown_marker: String,
    /// Variant identifiers removed before canonicalisation
    pub excluded_variants: Vec<String>,
}

impl Default for NameNormalization {
    fn default() -> Self {
        NameNormalization {
            unknown_marker: "group".to_string(),
            excluded_variants: vec!["lsrB_1".to_string()],
        }
    }
}

/// Canonical gene name of a variant identifier: the part before the first `_`.
pub fn canonical_gene_name(variant: &str) -> &str {
    variant.split('_').next().unwrap_or(variant)
}

/// Whether a variant identifier denotes a gene of unknown function.
pub fn is_unknown_function(variant: &str, marker: &str) -> bool {
    !marker.is_empty() && variant.contains(marker)
}

/// Collapses a raw presence matrix to one binary row per canonical gene name.
///
/// Canonical names are emitted in sorted order.
pub fn normalize_gene_names(matrix: &PresenceMatrix, opts: &NameNormalization) -> PresenceMatrix {
    let n_genomes = matrix.genome_names.len();
    let mut collapsed: IndexMap<String, Array1<f64>> = IndexMap::new();
    let mut excluded = 0usize;
    let mut unknown = 0usize;

    for (idx, variant) in matrix.gene_names.iter().enumerate() {
        if opts.excluded_variants.iter().any(|v| v == variant) {
            excluded += 1;
            continue;
        }
        if is_unknown_function(variant, &opts.unknown_marker) {
            unknown += 1;
            continue;
        }

        let row = matrix.presence.row(idx);
        let canonical = canonical_gene_name(variant);
        if canonical.is_empty() {
            warn!("Skipping variant '{}' with empty gene name", variant);
            continue;
        }
        let acc = collapsed
            .entry(canonical.to_string())
            .or_insert_with(|| Array1::zeros(n_genomes));
        *acc += &row;
    }

    for variant in &opts.excluded_variants {
        if !matrix.gene_map.contains_key(variant) {
            warn!("Excluded variant '{}' not present in matrix", variant);
        }
    }

    collapsed.sort_keys();

    let mut presence = Array2::<f64>::zeros((collapsed.len(), n_genomes));
    for (mut target, summed) in presence.rows_mut().into_iter().zip(collapsed.values()) {
        target.assign(&summed.mapv(|v| v.min(1.0)));
    }

    info!(
        "Normalized {} variants into {} genes ({} excluded, {} of unknown function)",
        matrix.gene_names.len(),
        collapsed.len(),
        excluded,
        unknown
    );

    PresenceMatrix::from_parts(
        presence,
        collapsed.into_keys().collect(),
        matrix.genome_names.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn create_test_matrix() -> PresenceMatrix {
        let presence = arr2(&[
            [1.0, 0.0, 0.0], // lsrB
            [0.0, 1.0, 0.0], // lsrB_2
            [1.0, 1.0, 0.0], // lsrB_3_1
            [1.0, 1.0, 1.0], // lsrB_1
            [0.0, 0.0, 1.0], // group_44
            [1.0, 0.0, 1.0], // frlA
        ]);
        let genes = ["lsrB", "lsrB_2", "lsrB_3_1", "lsrB_1", "group_44", "frlA"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let genomes = ["G1", "G2", "G3"].iter().map(|s| s.to_string()).collect();
        PresenceMatrix::from_parts(presence, genes, genomes)
    }

    #[test]
    fn test_canonical_gene_name() {
        assert_eq!(canonical_gene_name("lsrB_1_1"), "lsrB");
        assert_eq!(canonical_gene_name("frlA"), "frlA");
        assert_eq!(canonical_gene_name("_x"), "");
    }

    #[test]
    fn test_unknown_marker() {
        assert!(is_unknown_function("group_12", "group"));
        assert!(!is_unknown_function("lsrB", "group"));
        assert!(!is_unknown_function("group_12", ""));
    }

    #[test]
    fn test_duplicates_sum_and_clip() {
        let matrix = create_test_matrix();
        let normalized = normalize_gene_names(&matrix, &NameNormalization::default());

        assert_eq!(normalized.gene_names(), &["frlA", "lsrB"]);
        // lsrB + lsrB_2 + lsrB_3_1 = [2, 2, 0] -> clipped; lsrB_1 is excluded
        assert_eq!(
            normalized.presence.row(normalized.gene_map["lsrB"]).to_vec(),
            vec![1.0, 1.0, 0.0]
        );
        assert_eq!(
            normalized.presence.row(normalized.gene_map["frlA"]).to_vec(),
            vec![1.0, 0.0, 1.0]
        );
        assert!(normalized.presence.iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_without_exclusions_every_variant_counts() {
        let matrix = create_test_matrix();
        let opts = NameNormalization {
            unknown_marker: "group".to_string(),
            excluded_variants: Vec::new(),
        };
        let normalized = normalize_gene_names(&matrix, &opts);
        assert_eq!(
            normalized.presence.row(normalized.gene_map["lsrB"]).to_vec(),
            vec![1.0, 1.0, 1.0]
        );
        assert!(!normalized.gene_map.contains_key("group"));
    }
}
