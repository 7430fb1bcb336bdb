//! Per-lineage gene frequencies.
//!
//! The frequency of a gene in a lineage is the fraction of the lineage's
//! genomes that carry it, i.e. the mean of the binary presence values over the
//! genome columns assigned to that lineage.

use indexmap::IndexMap;
use log::{info, warn};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::metadata::Metadata;
use crate::presence::PresenceMatrix;

/// Gene x lineage frequency table. Every value lies in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyTable {
    pub frequencies: Array2<f64>,

    pub gene_names: Vec<String>,
    pub gene_map: HashMap<String, usize>,

    pub lineage_names: Vec<String>,
    pub lineage_map: HashMap<String, usize>,

    /// Number of genomes contributing to each lineage column
    pub genome_counts: Vec<usize>,
}

/// Orders lineage labels numerically when both parse as numbers, lexically otherwise.
/// Numeric labels sort before non-numeric ones.
pub fn compare_lineage_labels(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl FrequencyTable {
    /// Aggregates a normalized presence matrix into lineage frequencies.
    ///
    /// Genomes without a lineage are skipped. With `sort_lineages` the columns
    /// follow [`compare_lineage_labels`]; otherwise first-appearance order.
    pub fn from_presence(
        matrix: &PresenceMatrix,
        metadata: &Metadata,
        sort_lineages: bool,
    ) -> Result<Self, AnalysisError> {
        let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
        let mut unassigned = 0usize;

        for (col, genome) in matrix.genome_names.iter().enumerate() {
            match metadata.lineage_of(genome) {
                Some(lineage) => groups.entry(lineage.to_string()).or_default().push(col),
                None => {
                    warn!("Genome '{}' has no lineage; skipping", genome);
                    unassigned += 1;
                }
            }
        }

        if groups.is_empty() {
            return Err(AnalysisError::NoLineages);
        }
        if sort_lineages {
            groups.sort_by(|a, _, b, _| compare_lineage_labels(a, b));
        }

        let n_genes = matrix.gene_names.len();
        let mut frequencies = Array2::<f64>::zeros((n_genes, groups.len()));
        let mut genome_counts = Vec::with_capacity(groups.len());

        for (j, columns) in groups.values().enumerate() {
            let subset = matrix.presence.select(Axis(1), columns);
            if let Some(mean) = subset.mean_axis(Axis(1)) {
                frequencies.column_mut(j).assign(&mean);
            }
            genome_counts.push(columns.len());
        }

        info!(
            "Computed frequencies for {} genes across {} lineages ({} genomes unassigned)",
            n_genes,
            groups.len(),
            unassigned
        );

        let lineage_names: Vec<String> = groups.into_keys().collect();
        Ok(Self::from_parts(
            frequencies,
            matrix.gene_names.clone(),
            lineage_names,
            genome_counts,
        ))
    }

    pub fn from_parts(
        frequencies: Array2<f64>,
        gene_names: Vec<String>,
        lineage_names: Vec<String>,
        genome_counts: Vec<usize>,
    ) -> Self {
        let gene_map = gene_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let lineage_map = lineage_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        FrequencyTable {
            frequencies,
            gene_names,
            gene_map,
            lineage_names,
            lineage_map,
            genome_counts,
        }
    }

    /// Frequencies of one gene across all lineages.
    pub fn gene_profile(&self, gene: &str) -> Result<ArrayView1<'_, f64>, AnalysisError> {
        self.gene_map
            .get(gene)
            .map(|&idx| self.frequencies.row(idx))
            .ok_or_else(|| AnalysisError::UnknownGene(gene.to_string()))
    }

    /// Frequencies of all genes within one lineage.
    pub fn lineage_profile(&self, lineage: &str) -> Result<ArrayView1<'_, f64>, AnalysisError> {
        self.lineage_map
            .get(lineage)
            .map(|&idx| self.frequencies.column(idx))
            .ok_or_else(|| AnalysisError::UnknownLineage(lineage.to_string()))
    }

    pub fn frequency(&self, gene: &str, lineage: &str) -> Option<f64> {
        let row = *self.gene_map.get(gene)?;
        let col = *self.lineage_map.get(lineage)?;
        Some(self.frequencies[[row, col]])
    }

    pub fn gene_names(&self) -> &[String] {
        &self.gene_names
    }

    pub fn lineage_names(&self) -> &[String] {
        &self.lineage_names
    }
}
