//! Gene presence/absence matrix.
//!
//! Rows are gene variant identifiers (e.g. `lsrB_1_1`), columns are genome
//! identifiers and every cell records whether the variant was found in the
//! genome. The input CSV carries one extra row (normally labelled `Lineage`)
//! holding the lineage of each genome; it is split off into [`Metadata`] while
//! loading so that it never takes part in the numeric aggregation.

use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::AnalysisError;
use crate::io::open_input;
use crate::metadata::Metadata;

/// Layout of the presence matrix CSV.
#[derive(Debug, Clone)]
pub struct MatrixLayout {
    /// Header of the column holding the gene variant identifiers
    pub gene_column: String,
    /// Identifier of the row holding the lineage labels
    pub lineage_row: String,
}

impl Default for MatrixLayout {
    fn default() -> Self {
        MatrixLayout {
            gene_column: "Strain".to_string(),
            lineage_row: "Lineage".to_string(),
        }
    }
}

/// Gene x genome presence matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMatrix {
    /// Presence values (genes x genomes). 0.0 or 1.0 once normalized.
    pub presence: Array2<f64>,

    pub gene_names: Vec<String>,
    pub gene_map: HashMap<String, usize>,

    pub genome_names: Vec<String>,
    pub genome_map: HashMap<String, usize>,
}

impl PresenceMatrix {
    /// Builds a matrix from its parts. `presence` must be `gene_names.len() x genome_names.len()`.
    pub fn from_parts(
        presence: Array2<f64>,
        gene_names: Vec<String>,
        genome_names: Vec<String>,
    ) -> Self {
        debug_assert_eq!(presence.dim(), (gene_names.len(), genome_names.len()));
        let gene_map = gene_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let genome_map = genome_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        PresenceMatrix {
            presence,
            gene_names,
            gene_map,
            genome_names,
            genome_map,
        }
    }

    pub fn gene_names(&self) -> &[String] {
        &self.gene_names
    }

    pub fn genome_names(&self) -> &[String] {
        &self.genome_names
    }
}

/// Parses a single matrix cell. Empty cells count as absent.
fn parse_presence(raw: &str, gene: &str, genome: &str) -> Result<f64, AnalysisError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(AnalysisError::InvalidPresence {
            gene: gene.to_string(),
            genome: genome.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Loads a presence/absence matrix CSV (optionally gzipped).
///
/// Returns the numeric matrix and the genome lineages found in the lineage
/// row. The metadata is empty when the file has no lineage row.
pub fn load_presence_matrix(
    path: &Path,
    layout: &MatrixLayout,
) -> Result<(PresenceMatrix, Metadata), AnalysisError> {
    let reader = open_input(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let gene_col = headers
        .iter()
        .position(|h| h.trim() == layout.gene_column)
        .ok_or_else(|| AnalysisError::MissingGeneColumn(layout.gene_column.clone()))?;

    let genome_cols: Vec<usize> = (0..headers.len()).filter(|&i| i != gene_col).collect();
    if genome_cols.is_empty() {
        return Err(AnalysisError::EmptyMatrix);
    }
    let genome_names: Vec<String> = genome_cols
        .iter()
        .map(|&i| headers[i].trim().to_string())
        .collect();

    let mut metadata = Metadata::new();
    let mut gene_names = Vec::new();
    let mut values: Vec<f64> = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let gene = record.get(gene_col).unwrap_or_default().trim();

        if gene == layout.lineage_row {
            for (genome, &col) in genome_names.iter().zip(&genome_cols) {
                metadata.add_genome(genome, record.get(col).unwrap_or_default().trim());
            }
            continue;
        }

        for (genome, &col) in genome_names.iter().zip(&genome_cols) {
            values.push(parse_presence(
                record.get(col).unwrap_or_default(),
                gene,
                genome,
            )?);
        }
        gene_names.push(gene.to_string());
    }

    let presence = Array2::from_shape_vec((gene_names.len(), genome_names.len()), values)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    info!(
        "Loaded presence matrix from {}: {} gene variants x {} genomes",
        path.display(),
        gene_names.len(),
        genome_names.len()
    );
    debug!("Lineage row assigned {} genomes", metadata.genome_count());

    Ok((
        PresenceMatrix::from_parts(presence, gene_names, genome_names),
        metadata,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MATRIX: &str = "\
Strain,G1,G2,G3
lsrB_1_1,1,0,1
frlA,1,1,0
Lineage,1,1,2
group_123,0,0,1
";

    #[test]
    fn test_load_splits_lineage_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        fs::write(&path, MATRIX).unwrap();

        let (matrix, metadata) = load_presence_matrix(&path, &MatrixLayout::default()).unwrap();

        assert_eq!(matrix.presence.dim(), (3, 3));
        assert_eq!(matrix.gene_names(), &["lsrB_1_1", "frlA", "group_123"]);
        assert_eq!(matrix.genome_names(), &["G1", "G2", "G3"]);
        assert_eq!(
            matrix.presence.row(matrix.gene_map["frlA"]).to_vec(),
            vec![1.0, 1.0, 0.0]
        );
        assert_eq!(
            matrix.presence.column(matrix.genome_map["G3"]).to_vec(),
            vec![1.0, 0.0, 1.0]
        );
        assert_eq!(metadata.lineage_of("G3"), Some("2"));
        assert_eq!(metadata.lineage_of("G1"), Some("1"));
    }

    #[test]
    fn test_missing_gene_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        fs::write(&path, "Gene,G1\nfrlA,1\n").unwrap();

        let err = load_presence_matrix(&path, &MatrixLayout::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingGeneColumn(_)));
    }

    #[test]
    fn test_invalid_presence_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.csv");
        fs::write(&path, "Strain,G1,G2\nfrlA,1,yes\n").unwrap();

        let err = load_presence_matrix(&path, &MatrixLayout::default()).unwrap_err();
        match err {
            AnalysisError::InvalidPresence { gene, genome, value } => {
                assert_eq!(gene, "frlA");
                assert_eq!(genome, "G2");
                assert_eq!(value, "yes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_cells_are_absent() {
        assert_eq!(parse_presence("", "g", "x").unwrap(), 0.0);
        assert_eq!(parse_presence(" 1 ", "g", "x").unwrap(), 1.0);
        assert!(parse_presence("-1", "g", "x").is_err());
    }
}
