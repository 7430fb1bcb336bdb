use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use crate::comparison::{
    compare_lineages, group_lineages, summarize_comparisons, ComparisonSummary, LineageGroups,
    PairComparison,
};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::frequency::FrequencyTable;
use crate::io::{
    write_comparison_summaries, write_comparisons, write_correlations, write_frequency_table,
    write_json, write_presence_matrix,
};
use crate::metadata::load_metadata;
use crate::normalization::normalize_gene_names;
use crate::phylo::{read_newick_file, PhyloTree, TreeError};
use crate::presence::load_presence_matrix;
use crate::stats::{rank_by_correlation, GeneCorrelation};
use crate::visualization::{TreeAnnotation, TreeStyle, Visualizer};

/// Pipeline stages reachable from the command line. Each stage includes
/// the frequency table build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Frequencies,
    Correlate,
    Trees,
    Compare,
    All,
}

impl Stage {
    fn correlates(self) -> bool {
        matches!(self, Stage::Correlate | Stage::All)
    }

    fn renders_trees(self) -> bool {
        matches!(self, Stage::Trees | Stage::All)
    }

    fn compares(self) -> bool {
        matches!(self, Stage::Compare | Stage::All)
    }

    fn needs_tree(self) -> bool {
        self.renders_trees() || self.compares()
    }
}

/// Input files of an analysis run
#[derive(Debug, Clone)]
pub struct AnalysisInputs {
    pub matrix: PathBuf,
    pub tree: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub output_dir: PathBuf,
}

/// Counts gathered while the pipeline runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub gene_variants: usize,
    pub genes: usize,
    pub genomes: usize,
    pub lineages: usize,
    pub tree_leaves: usize,
    pub pruned_nodes: Vec<String>,
    pub removed_leaves: Vec<String>,
    pub processing_time_seconds: f64,
}

/// Everything a run produced, serialized to `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub stage: Stage,
    pub reference_gene: String,
    pub metrics: ProcessingMetrics,
    pub lineages: Vec<String>,
    pub correlations: Vec<GeneCorrelation>,
    pub groups: Option<LineageGroups>,
    pub comparison_summaries: Vec<ComparisonSummary>,
    pub output_files: Vec<PathBuf>,
}

/// Tree after pruning, with what was removed from it.
pub struct PreparedTree {
    pub tree: PhyloTree,
    pub pruned_nodes: Vec<String>,
    pub removed_leaves: Vec<String>,
}

/// Runs the presence → frequency → correlation/comparison pipeline.
pub struct AnalysisProcessor {
    config: AnalysisConfig,
    inputs: AnalysisInputs,
}

impl AnalysisProcessor {
    pub fn new(config: AnalysisConfig, inputs: AnalysisInputs) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&inputs.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                inputs.output_dir.display()
            )
        })?;
        Ok(AnalysisProcessor { config, inputs })
    }

    fn output_path(&self, file_name: &str) -> PathBuf {
        self.inputs.output_dir.join(file_name)
    }

    /// Loads the matrix, normalizes gene names and aggregates per lineage.
    ///
    /// Lineages come from the matrix's lineage row; a metadata file, when
    /// given, overrides them genome by genome. Writes
    /// `presence_normalized.csv` and `frequencies.csv`.
    pub fn build_frequencies(
        &self,
        metrics: &mut ProcessingMetrics,
        outputs: &mut Vec<PathBuf>,
    ) -> Result<FrequencyTable> {
        let (raw, mut metadata) =
            load_presence_matrix(&self.inputs.matrix, &self.config.matrix_layout())
                .with_context(|| {
                    format!(
                        "Failed to load presence matrix {}",
                        self.inputs.matrix.display()
                    )
                })?;

        if let Some(path) = &self.inputs.metadata {
            let extra = load_metadata(path)?;
            info!(
                "Merging lineages for {} genomes from {}",
                extra.genome_count(),
                path.display()
            );
            metadata.merge(&extra);
        }
        if metadata.genome_count() == 0 {
            return Err(AnalysisError::MissingLineageRow(self.config.lineage_row.clone()).into());
        }

        let normalized = normalize_gene_names(&raw, &self.config.name_normalization());
        let table =
            FrequencyTable::from_presence(&normalized, &metadata, self.config.sort_lineages)?;

        metrics.gene_variants = raw.gene_names().len();
        metrics.genes = normalized.gene_names().len();
        metrics.genomes = raw.genome_names().len();
        metrics.lineages = table.lineage_names().len();

        let presence_path = self.output_path("presence_normalized.csv");
        write_presence_matrix(&normalized, &presence_path)?;
        outputs.push(presence_path);

        let frequency_path = self.output_path("frequencies.csv");
        write_frequency_table(&table, &frequency_path)?;
        outputs.push(frequency_path);

        Ok(table)
    }

    /// Ranks every gene by correlation with the reference gene and writes
    /// `correlations.csv`.
    pub fn correlations(
        &self,
        table: &FrequencyTable,
        outputs: &mut Vec<PathBuf>,
    ) -> Result<Vec<GeneCorrelation>> {
        let ranked = rank_by_correlation(table, &self.config.reference_gene)?;
        let path = self.output_path("correlations.csv");
        write_correlations(&ranked, &path)?;
        outputs.push(path);
        Ok(ranked)
    }

    /// Reads the Newick tree and removes the configured nodes.
    pub fn load_tree(&self, table: &FrequencyTable) -> Result<PreparedTree> {
        let path = self
            .inputs
            .tree
            .as_deref()
            .context("A Newick tree file is required for this command")?;
        let mut tree = read_newick_file(path)
            .with_context(|| format!("Failed to read tree {}", path.display()))?;
        let preserve = self.config.preserve_branch_length;

        let mut pruned_nodes = Vec::new();
        for label in &self.config.prune_nodes {
            match tree.delete_by_name(label, preserve) {
                Ok(()) => pruned_nodes.push(label.clone()),
                Err(TreeError::UnknownLabel(_)) => {
                    warn!("Prune node '{}' not found in tree", label)
                }
                Err(e) => return Err(e.into()),
            }
        }

        let removed_leaves = if self.config.prune_unmatched_leaves {
            let removed = tree.retain_leaves(|leaf| table.lineage_map.contains_key(leaf), preserve);
            if !removed.is_empty() {
                info!(
                    "Removed {} tree leaves without lineage frequencies",
                    removed.len()
                );
            }
            removed
        } else {
            Vec::new()
        };

        info!(
            "Prepared tree from {}: {} leaves, {} nodes pruned",
            path.display(),
            tree.leaves().len(),
            pruned_nodes.len()
        );
        Ok(PreparedTree {
            tree,
            pruned_nodes,
            removed_leaves,
        })
    }

    fn visualizer(&self) -> Result<Visualizer> {
        Ok(Visualizer::new(
            &self.inputs.output_dir,
            self.config.export_png,
        )?)
    }

    /// Draws the tree once per partner gene.
    pub fn render_trees(&self, tree: &PhyloTree, table: &FrequencyTable) -> Result<Vec<PathBuf>> {
        let visualizer = self.visualizer()?;
        let style = TreeStyle {
            width: self.config.tree_width,
            leaf_spacing: self.config.leaf_spacing,
        };

        let mut outputs = Vec::new();
        for partner in &self.config.partner_genes {
            if !table.gene_map.contains_key(partner) {
                warn!("Partner gene '{}' not in frequency table; drawn grey", partner);
            }
            let annotation = TreeAnnotation {
                reference: &self.config.reference_gene,
                partner,
                thresholds: self.config.presence_thresholds,
            };
            outputs.extend(visualizer.render_annotated_tree(tree, table, &annotation, style)?);
        }
        Ok(outputs)
    }

    /// Groups lineages, scores every pair and writes the comparison tables.
    pub fn compare(
        &self,
        tree: &PhyloTree,
        table: &FrequencyTable,
        outputs: &mut Vec<PathBuf>,
    ) -> Result<(LineageGroups, Vec<PairComparison>, Vec<ComparisonSummary>)> {
        let groups = group_lineages(
            table,
            &self.config.reference_gene,
            &self.config.grouping_partner,
            self.config.group_threshold,
        )?;
        let comparisons = compare_lineages(table, tree, &groups)?;
        let summaries = summarize_comparisons(&comparisons);

        let comparison_path = self.output_path("comparisons.csv");
        write_comparisons(&comparisons, &comparison_path)?;
        outputs.push(comparison_path);

        let summary_path = self.output_path("comparison_summary.csv");
        write_comparison_summaries(&summaries, &summary_path)?;
        outputs.push(summary_path);

        Ok((groups, comparisons, summaries))
    }

    /// Runs `stage` and writes `summary.json`.
    pub fn run(&self, stage: Stage) -> Result<AnalysisResults> {
        let start_time = Instant::now();
        info!(
            "Running {:?} on {} (output: {})",
            stage,
            self.inputs.matrix.display(),
            self.inputs.output_dir.display()
        );

        let mut metrics = ProcessingMetrics::default();
        let mut outputs = Vec::new();

        let table = self.build_frequencies(&mut metrics, &mut outputs)?;

        let correlations = if stage.correlates() {
            self.correlations(&table, &mut outputs)?
        } else {
            Vec::new()
        };

        let mut groups = None;
        let mut comparison_summaries = Vec::new();
        if stage.needs_tree() {
            let prepared = self.load_tree(&table)?;
            metrics.tree_leaves = prepared.tree.leaves().len();
            metrics.pruned_nodes = prepared.pruned_nodes;
            metrics.removed_leaves = prepared.removed_leaves;

            if stage.renders_trees() {
                outputs.extend(self.render_trees(&prepared.tree, &table)?);
            }
            if stage.compares() {
                let (g, comparisons, summaries) =
                    self.compare(&prepared.tree, &table, &mut outputs)?;
                outputs.extend(
                    self.visualizer()?
                        .render_comparison_scatter(&comparisons, self.config.scatter_size)?,
                );
                groups = Some(g);
                comparison_summaries = summaries;
            }
        }

        metrics.processing_time_seconds = start_time.elapsed().as_secs_f64();
        let summary_path = self.output_path("summary.json");
        outputs.push(summary_path.clone());

        let results = AnalysisResults {
            stage,
            reference_gene: self.config.reference_gene.clone(),
            metrics,
            lineages: table.lineage_names().to_vec(),
            correlations,
            groups,
            comparison_summaries,
            output_files: outputs,
        };
        write_json(&results, &summary_path)?;

        info!(
            "{:?} finished in {:.2} seconds",
            stage, results.metrics.processing_time_seconds
        );
        Ok(results)
    }
}
