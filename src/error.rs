//! Error types shared by the matrix, frequency and comparison stages.

use thiserror::Error;

use crate::phylo::TreeError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Gene column '{0}' not found in matrix header")]
    MissingGeneColumn(String),

    #[error("Lineage row '{0}' not found in presence matrix and no metadata file given")]
    MissingLineageRow(String),

    #[error("Invalid presence value '{value}' for gene '{gene}' in genome '{genome}'")]
    InvalidPresence {
        gene: String,
        genome: String,
        value: String,
    },

    #[error("Presence matrix contains no genomes")]
    EmptyMatrix,

    #[error("No genome could be assigned to a lineage")]
    NoLineages,

    #[error("Gene '{0}' not found in frequency table")]
    UnknownGene(String),

    #[error("Lineage '{0}' not found in frequency table")]
    UnknownLineage(String),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
}
