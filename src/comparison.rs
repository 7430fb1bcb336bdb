//! Lineage grouping and pairwise similarity/distance comparison.
//!
//! Lineages are split by the frequencies of a reference gene and a partner
//! gene into carriers (both above the threshold), non-carriers (neither above
//! it) and partial carriers (the rest). Pairs of lineages within and between
//! these groups are then scored by functional similarity of their whole gene
//! frequency profiles and by their distance in the phylogenetic tree.

use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::frequency::FrequencyTable;
use crate::phylo::{NodeId, PhyloTree};
use crate::stats::{frequency_similarity, pearson};

/// Which set of lineage pairs a comparison belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonSet {
    /// Every lineage against every other
    All,
    /// Carrier against carrier
    Carrier,
    /// Non-carrier against non-carrier
    NonCarrier,
    /// Carrier against non-carrier
    CarrierVsNonCarrier,
    /// Partial carrier against partial carrier
    Partial,
}

impl ComparisonSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonSet::All => "all",
            ComparisonSet::Carrier => "carrier",
            ComparisonSet::NonCarrier => "non_carrier",
            ComparisonSet::CarrierVsNonCarrier => "carrier_vs_non_carrier",
            ComparisonSet::Partial => "partial",
        }
    }

    /// Sets in drawing order; later sets are drawn on top.
    pub fn all_sets() -> [ComparisonSet; 5] {
        [
            ComparisonSet::All,
            ComparisonSet::Carrier,
            ComparisonSet::NonCarrier,
            ComparisonSet::CarrierVsNonCarrier,
            ComparisonSet::Partial,
        ]
    }
}

/// Lineages split by carriage of the reference and partner genes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageGroups {
    pub carrier: Vec<String>,
    pub non_carrier: Vec<String>,
    pub partial: Vec<String>,
}

/// One scored lineage pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairComparison {
    pub set: ComparisonSet,
    pub lineage_a: String,
    pub lineage_b: String,
    /// `None` when both lineages carry no gene at all
    pub similarity: Option<f64>,
    pub distance: f64,
}

/// Aggregate statistics of one comparison set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub set: ComparisonSet,
    pub pairs: usize,
    pub mean_similarity: Option<f64>,
    pub mean_distance: Option<f64>,
    /// Correlation between similarity and distance across the set's pairs
    pub similarity_distance_pearson: Option<f64>,
}

/// Splits lineages by the frequencies of `reference` and `partner`.
///
/// A lineage is a carrier when both frequencies exceed `threshold`, a
/// non-carrier when neither does, and partial otherwise. Group members keep
/// the table's lineage order.
pub fn group_lineages(
    table: &FrequencyTable,
    reference: &str,
    partner: &str,
    threshold: f64,
) -> Result<LineageGroups, AnalysisError> {
    let reference_profile = table.gene_profile(reference)?;
    let partner_profile = table.gene_profile(partner)?;

    let mut groups = LineageGroups::default();
    for ((lineage, &r), &p) in table
        .lineage_names()
        .iter()
        .zip(reference_profile.iter())
        .zip(partner_profile.iter())
    {
        let target = match (r > threshold, p > threshold) {
            (true, true) => &mut groups.carrier,
            (false, false) => &mut groups.non_carrier,
            _ => &mut groups.partial,
        };
        target.push(lineage.clone());
    }

    info!(
        "Grouped lineages by {}/{} (threshold {}): {} carrier, {} non-carrier, {} partial",
        reference,
        partner,
        threshold,
        groups.carrier.len(),
        groups.non_carrier.len(),
        groups.partial.len()
    );
    Ok(groups)
}

/// Enumerates the lineage pairs of every comparison set, in output order.
pub fn enumerate_pairs<'a>(
    all: &'a [String],
    groups: &'a LineageGroups,
) -> Vec<(ComparisonSet, &'a str, &'a str)> {
    fn within(set: ComparisonSet, lineages: &[String]) -> Vec<(ComparisonSet, &str, &str)> {
        lineages
            .iter()
            .tuple_combinations()
            .map(|(a, b)| (set, a.as_str(), b.as_str()))
            .collect()
    }

    let mut pairs = within(ComparisonSet::All, all);
    pairs.extend(within(ComparisonSet::Carrier, &groups.carrier));
    pairs.extend(within(ComparisonSet::NonCarrier, &groups.non_carrier));
    pairs.extend(
        groups
            .non_carrier
            .iter()
            .cartesian_product(groups.carrier.iter())
            .map(|(a, b)| (ComparisonSet::CarrierVsNonCarrier, a.as_str(), b.as_str())),
    );
    pairs.extend(within(ComparisonSet::Partial, &groups.partial));
    pairs
}

/// Scores every lineage pair by frequency similarity and tree distance.
///
/// Every lineage of the table must label exactly one tree node.
pub fn compare_lineages(
    table: &FrequencyTable,
    tree: &PhyloTree,
    groups: &LineageGroups,
) -> Result<Vec<PairComparison>, AnalysisError> {
    let node_ids: HashMap<&str, NodeId> = table
        .lineage_names()
        .iter()
        .map(|lineage| Ok::<_, AnalysisError>((lineage.as_str(), tree.find(lineage)?)))
        .collect::<Result<_, AnalysisError>>()?;

    let pairs = enumerate_pairs(table.lineage_names(), groups);
    debug!("Scoring {} lineage pairs", pairs.len());

    let comparisons: Vec<PairComparison> = pairs
        .par_iter()
        .map(|&(set, a, b)| {
            let similarity =
                frequency_similarity(table.lineage_profile(a)?, table.lineage_profile(b)?);
            let distance = tree.distance_between(node_ids[a], node_ids[b]);
            Ok::<_, AnalysisError>(PairComparison {
                set,
                lineage_a: a.to_string(),
                lineage_b: b.to_string(),
                similarity,
                distance,
            })
        })
        .collect::<Result<_, AnalysisError>>()?;

    let undefined = comparisons
        .iter()
        .filter(|c| c.similarity.is_none())
        .count();
    if undefined > 0 {
        warn!("{} lineage pairs have undefined similarity", undefined);
    }
    info!("Scored {} lineage pairs", comparisons.len());
    Ok(comparisons)
}

/// Per-set means and the similarity/distance correlation.
pub fn summarize_comparisons(comparisons: &[PairComparison]) -> Vec<ComparisonSummary> {
    ComparisonSet::all_sets()
        .into_iter()
        .map(|set| {
            let members: Vec<&PairComparison> =
                comparisons.iter().filter(|c| c.set == set).collect();
            let (similarities, distances): (Vec<f64>, Vec<f64>) = members
                .iter()
                .filter_map(|c| c.similarity.map(|s| (s, c.distance)))
                .unzip();
            let mean = |values: &[f64]| {
                (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
            };
            let all_distances: Vec<f64> = members.iter().map(|c| c.distance).collect();

            ComparisonSummary {
                set,
                pairs: members.len(),
                mean_similarity: mean(&similarities),
                mean_distance: mean(&all_distances),
                similarity_distance_pearson: pearson(&similarities, &distances),
            }
        })
        .collect()
}
