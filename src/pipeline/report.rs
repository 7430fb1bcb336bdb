use crate::pipeline::processor::AnalysisResults;

const TOP_CORRELATIONS: usize = 10;

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or("NA".to_string(), |v| format!("{:.3}", v))
}

/// Plain-text summary of an analysis run.
pub fn generate_report(results: &AnalysisResults) -> String {
    let mut report = String::new();

    report.push_str(&format!(
        "Lineage Co-occurrence Report ({:?}, reference gene {})\n",
        results.stage, results.reference_gene
    ));
    report.push_str("=================================================\n\n");

    let metrics = &results.metrics;
    report.push_str("Input:\n");
    report.push_str(&format!(
        "  Gene variants: {} -> {} genes\n",
        metrics.gene_variants, metrics.genes
    ));
    report.push_str(&format!(
        "  Genomes: {} in {} lineages\n",
        metrics.genomes, metrics.lineages
    ));
    if metrics.tree_leaves > 0 {
        report.push_str(&format!(
            "  Tree leaves after pruning: {}\n",
            metrics.tree_leaves
        ));
        if !metrics.pruned_nodes.is_empty() {
            report.push_str(&format!(
                "  Pruned nodes: {}\n",
                metrics.pruned_nodes.join(", ")
            ));
        }
        if !metrics.removed_leaves.is_empty() {
            report.push_str(&format!(
                "  Leaves without frequencies removed: {}\n",
                metrics.removed_leaves.join(", ")
            ));
        }
    }
    report.push_str(&format!(
        "  Processing time: {:.2} seconds\n\n",
        metrics.processing_time_seconds
    ));

    if !results.correlations.is_empty() {
        report.push_str(&format!(
            "Top correlations with {}:\n",
            results.reference_gene
        ));
        for c in results
            .correlations
            .iter()
            .filter(|c| c.gene != results.reference_gene)
            .take(TOP_CORRELATIONS)
        {
            report.push_str(&format!("  {:<20} {}\n", c.gene, fmt_opt(c.pearson)));
        }
        report.push('\n');
    }

    if let Some(groups) = &results.groups {
        report.push_str("Lineage groups:\n");
        report.push_str(&format!(
            "  Carrier ({}): {}\n",
            groups.carrier.len(),
            groups.carrier.join(", ")
        ));
        report.push_str(&format!(
            "  Non-carrier ({}): {}\n",
            groups.non_carrier.len(),
            groups.non_carrier.join(", ")
        ));
        report.push_str(&format!(
            "  Partial ({}): {}\n\n",
            groups.partial.len(),
            groups.partial.join(", ")
        ));
    }

    if !results.comparison_summaries.is_empty() {
        report.push_str("Similarity vs. distance:\n");
        report.push_str(&format!(
            "  {:<24} {:>6} {:>10} {:>10} {:>8}\n",
            "set", "pairs", "mean sim", "mean dist", "r"
        ));
        for s in &results.comparison_summaries {
            report.push_str(&format!(
                "  {:<24} {:>6} {:>10} {:>10} {:>8}\n",
                s.set.as_str(),
                s.pairs,
                fmt_opt(s.mean_similarity),
                fmt_opt(s.mean_distance),
                fmt_opt(s.similarity_distance_pearson)
            ));
        }
        report.push('\n');
    }

    report.push_str(&format!("Output files ({}):\n", results.output_files.len()));
    for path in &results.output_files {
        report.push_str(&format!("  {}\n", path.display()));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{ComparisonSet, ComparisonSummary, LineageGroups};
    use crate::pipeline::processor::{ProcessingMetrics, Stage};
    use crate::stats::GeneCorrelation;
    use std::path::PathBuf;

    #[test]
    fn test_generate_report() {
        let results = AnalysisResults {
            stage: Stage::All,
            reference_gene: "lsrB".to_string(),
            metrics: ProcessingMetrics {
                gene_variants: 7,
                genes: 4,
                genomes: 6,
                lineages: 4,
                tree_leaves: 4,
                pruned_nodes: vec!["21".to_string()],
                removed_leaves: Vec::new(),
                processing_time_seconds: 0.5,
            },
            lineages: vec!["1".to_string(), "2".to_string()],
            correlations: vec![
                GeneCorrelation {
                    gene: "lsrB".to_string(),
                    pearson: Some(1.0),
                },
                GeneCorrelation {
                    gene: "frlA".to_string(),
                    pearson: Some(0.57735),
                },
                GeneCorrelation {
                    gene: "core".to_string(),
                    pearson: None,
                },
            ],
            groups: Some(LineageGroups {
                carrier: vec!["1".to_string(), "2".to_string()],
                non_carrier: vec!["3".to_string()],
                partial: Vec::new(),
            }),
            comparison_summaries: vec![ComparisonSummary {
                set: ComparisonSet::Carrier,
                pairs: 1,
                mean_similarity: Some(0.75),
                mean_distance: Some(2.0),
                similarity_distance_pearson: None,
            }],
            output_files: vec![PathBuf::from("out/frequencies.csv")],
        };

        let report = generate_report(&results);
        assert!(report.contains("reference gene lsrB"));
        assert!(report.contains("Gene variants: 7 -> 4 genes"));
        assert!(report.contains("Pruned nodes: 21"));
        assert!(report.contains("frlA"));
        assert!(report.contains("0.577"));
        assert!(report.contains("Carrier (2): 1, 2"));
        assert!(report.contains("carrier"));
        assert!(report.contains("0.750"));
        assert!(report.contains("out/frequencies.csv"));
        // the reference gene's self-correlation is not listed
        assert!(!report.contains("1.000"));
    }
}
