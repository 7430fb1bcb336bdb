use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::config::{load_config, AnalysisConfig};
use crate::pipeline::{generate_report, AnalysisInputs, AnalysisProcessor, Stage};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of threads used for pair scoring
    #[arg(short = 't', long, global = true, default_value_t = 1)]
    pub threads: usize,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Gene presence/absence matrix (CSV, optionally gzipped)
    #[arg(short, long)]
    pub matrix: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Genome metadata CSV overriding the matrix's lineage row
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Reference gene (overrides the configuration)
    #[arg(short, long)]
    pub reference: Option<String>,

    /// Also write PNG copies of the figures
    #[arg(long)]
    pub png: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the whole pipeline
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Newick tree whose leaves are lineages
        #[arg(long)]
        tree: PathBuf,
    },

    /// Write normalized presence and lineage frequency tables
    Frequencies {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Rank genes by correlation with the reference gene
    Correlate {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Compare functional similarity with tree distance between lineages
    Compare {
        #[command(flatten)]
        common: CommonArgs,

        /// Newick tree whose leaves are lineages
        #[arg(long)]
        tree: PathBuf,
    },

    /// Draw the tree annotated with reference/partner gene frequencies
    Trees {
        #[command(flatten)]
        common: CommonArgs,

        /// Newick tree whose leaves are lineages
        #[arg(long)]
        tree: PathBuf,
    },
}

impl Commands {
    fn into_parts(self) -> (Stage, CommonArgs, Option<PathBuf>) {
        match self {
            Commands::Run { common, tree } => (Stage::All, common, Some(tree)),
            Commands::Frequencies { common } => (Stage::Frequencies, common, None),
            Commands::Correlate { common } => (Stage::Correlate, common, None),
            Commands::Compare { common, tree } => (Stage::Compare, common, Some(tree)),
            Commands::Trees { common, tree } => (Stage::Trees, common, Some(tree)),
        }
    }
}

/// Loads the configuration file (if any) and applies flag overrides.
fn resolve_config(common: &CommonArgs) -> Result<AnalysisConfig> {
    let mut config = match &common.config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(reference) = &common.reference {
        config.reference_gene = reference.clone();
    }
    if common.png {
        config.export_png = true;
    }
    config.validate()?;
    Ok(config)
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<()> {
    let (stage, common, tree) = cli.command.into_parts();
    let config = resolve_config(&common)?;

    let inputs = AnalysisInputs {
        matrix: common.matrix,
        tree,
        metadata: common.metadata,
        output_dir: common.output,
    };
    let processor = AnalysisProcessor::new(config, inputs)?;
    let results = processor.run(stage)?;

    println!("{}", generate_report(&results));
    info!("Wrote {} output files", results.output_files.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "pangenome_lineage",
            "run",
            "--matrix",
            "matrix.csv",
            "--tree",
            "tree.nwk",
            "--png",
            "--threads",
            "4",
        ])
        .unwrap();
        assert_eq!(cli.threads, 4);
        let (stage, common, tree) = cli.command.into_parts();
        assert_eq!(stage, Stage::All);
        assert_eq!(common.matrix, PathBuf::from("matrix.csv"));
        assert_eq!(common.output, PathBuf::from("results"));
        assert!(common.png);
        assert_eq!(tree, Some(PathBuf::from("tree.nwk")));
    }

    #[test]
    fn test_compare_requires_tree_flag() {
        assert!(Cli::try_parse_from(["pangenome_lineage", "compare", "--matrix", "m.csv"]).is_err());
        assert!(Cli::try_parse_from(["pangenome_lineage", "correlate", "--matrix", "m.csv"]).is_ok());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"reference_gene": "lsrA", "group_threshold": 0.2}"#).unwrap();

        let cli = Cli::try_parse_from([
            "pangenome_lineage",
            "frequencies",
            "--matrix",
            "m.csv",
            "--config",
            path.to_str().unwrap(),
            "--reference",
            "lsrR",
            "--png",
        ])
        .unwrap();
        let (_, common, _) = cli.command.into_parts();
        let config = resolve_config(&common).unwrap();
        assert_eq!(config.reference_gene, "lsrR");
        assert_eq!(config.group_threshold, 0.2);
        assert!(config.export_png);
    }
}
