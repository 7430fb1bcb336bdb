//! Analysis configuration.
//!
//! Every field has a default reproducing the lsrB/frlA/lsrG analysis, so a
//! JSON config file only needs to name the values it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::normalization::NameNormalization;
use crate::presence::MatrixLayout;

/// Frequency cut-offs used to colour tree annotations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceThresholds {
    /// Frequencies strictly above this count as fixed in the lineage
    pub high: f64,
    /// Frequencies strictly below this count as absent from the lineage
    pub low: f64,
}

impl Default for PresenceThresholds {
    fn default() -> Self {
        PresenceThresholds {
            high: 0.95,
            low: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Header of the gene identifier column
    pub gene_column: String,
    /// Identifier of the row holding genome lineages
    pub lineage_row: String,
    /// Substring marking genes of unknown function
    pub unknown_marker: String,
    /// Variant rows dropped before name normalization
    pub excluded_variants: Vec<String>,

    /// Gene every other gene is correlated against
    pub reference_gene: String,
    /// Genes paired with the reference gene in tree annotations
    pub partner_genes: Vec<String>,
    /// Partner gene used to group lineages for the comparison
    pub grouping_partner: String,
    /// Carriage threshold for lineage grouping
    pub group_threshold: f64,
    pub presence_thresholds: PresenceThresholds,
    /// Sort lineages numerically/lexically instead of first-appearance order
    pub sort_lineages: bool,

    /// Tree nodes removed before rendering and distance lookups
    pub prune_nodes: Vec<String>,
    /// Remove tree leaves that have no lineage in the frequency table
    pub prune_unmatched_leaves: bool,
    pub preserve_branch_length: bool,

    /// Also write PNG copies of the scatter plot
    pub export_png: bool,
    pub tree_width: u32,
    pub leaf_spacing: u32,
    pub scatter_size: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            gene_column: "Strain".to_string(),
            lineage_row: "Lineage".to_string(),
            unknown_marker: "group".to_string(),
            excluded_variants: vec!["lsrB_1".to_string()],
            reference_gene: "lsrB".to_string(),
            partner_genes: vec!["frlA".to_string(), "lsrG".to_string()],
            grouping_partner: "frlA".to_string(),
            group_threshold: 0.1,
            presence_thresholds: PresenceThresholds::default(),
            sort_lineages: true,
            prune_nodes: vec!["21".to_string(), "49".to_string(), "43".to_string()],
            prune_unmatched_leaves: false,
            preserve_branch_length: false,
            export_png: false,
            tree_width: 760,
            leaf_spacing: 22,
            scatter_size: 600,
        }
    }
}

impl AnalysisConfig {
    pub fn matrix_layout(&self) -> MatrixLayout {
        MatrixLayout {
            gene_column: self.gene_column.clone(),
            lineage_row: self.lineage_row.clone(),
        }
    }

    pub fn name_normalization(&self) -> NameNormalization {
        NameNormalization {
            unknown_marker: self.unknown_marker.clone(),
            excluded_variants: self.excluded_variants.clone(),
        }
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let t = &self.presence_thresholds;
        if !(0.0..=1.0).contains(&t.low) || !(0.0..=1.0).contains(&t.high) || t.low > t.high {
            anyhow::bail!(
                "Presence thresholds must satisfy 0 <= low <= high <= 1 (got low={}, high={})",
                t.low,
                t.high
            );
        }
        if !(0.0..=1.0).contains(&self.group_threshold) {
            anyhow::bail!(
                "Group threshold must lie in [0, 1] (got {})",
                self.group_threshold
            );
        }
        if self.reference_gene.is_empty() {
            anyhow::bail!("Reference gene must not be empty");
        }
        Ok(())
    }
}

/// Loads a JSON configuration file; absent fields take their defaults.
pub fn load_config(path: &Path) -> Result<AnalysisConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open config file {}", path.display()))?;
    let config: AnalysisConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"reference_gene": "lsrA", "presence_thresholds": {"high": 0.9}}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.reference_gene, "lsrA");
        assert_eq!(config.presence_thresholds.high, 0.9);
        assert_eq!(config.presence_thresholds.low, 0.05);
        assert_eq!(config.gene_column, "Strain");
        assert_eq!(config.prune_nodes, vec!["21", "49", "43"]);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"presence_thresholds": {"high": 0.1, "low": 0.5}}"#).unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_config(&path).is_err());
        assert!(load_config(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }
}
