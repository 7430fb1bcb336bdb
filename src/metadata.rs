//! Genome metadata handling.
//!
//! Every genome of the presence matrix belongs to a lineage. The assignment
//! normally comes from the "Lineage" row of the matrix itself, but it can also
//! be read from a separate CSV file, which then takes precedence.

use anyhow::Result;
use indexmap::IndexMap;
use std::path::Path;

/// Lineage assignment for a collection of genomes.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Maps genome IDs to their lineage, in the order they were added
    pub lineage_map: IndexMap<String, String>,
}

impl Metadata {
    /// Creates a new, empty Metadata structure
    pub fn new() -> Self {
        Metadata {
            lineage_map: IndexMap::new(),
        }
    }

    /// Assigns a genome to a lineage, replacing any previous assignment
    pub fn add_genome(&mut self, genome_id: &str, lineage: &str) {
        self.lineage_map
            .insert(genome_id.to_string(), lineage.to_string());
    }

    /// Lineage of a genome. Empty labels count as unassigned.
    pub fn lineage_of(&self, genome_id: &str) -> Option<&str> {
        self.lineage_map
            .get(genome_id)
            .map(String::as_str)
            .filter(|l| !l.is_empty())
    }

    /// Returns the number of genomes in the metadata
    pub fn genome_count(&self) -> usize {
        self.lineage_map.len()
    }

    /// Overlays `other` on top of this assignment; genomes present in both take `other`'s lineage.
    pub fn merge(&mut self, other: &Metadata) {
        for (genome, lineage) in &other.lineage_map {
            self.add_genome(genome, lineage);
        }
    }
}

/// Loads a genome-to-lineage table from a CSV file.
///
/// The genome column may be called `Genome`, `SampleID`, `Sample` or `Strain`;
/// the lineage column `Lineage` or `Clade`. Other columns are ignored.
pub fn load_metadata(path: &Path) -> Result<Metadata> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut metadata = Metadata::new();

    let headers = rdr.headers()?.clone();
    let genome_col = headers.iter().position(|h| {
        let h = h.trim();
        ["genome", "sampleid", "sample", "strain"]
            .iter()
            .any(|name| h.eq_ignore_ascii_case(name))
    });
    let lineage_col = headers.iter().position(|h| {
        let h = h.trim();
        h.eq_ignore_ascii_case("lineage") || h.eq_ignore_ascii_case("clade")
    });

    let genome_col = genome_col
        .ok_or_else(|| anyhow::anyhow!("Metadata CSV missing 'Genome'/'SampleID' column"))?;
    let lineage_col = lineage_col
        .ok_or_else(|| anyhow::anyhow!("Metadata CSV missing 'Lineage'/'Clade' column"))?;

    for result in rdr.records() {
        let record = result?;
        let genome_id = record
            .get(genome_col)
            .ok_or_else(|| anyhow::anyhow!("Missing genome ID in metadata row"))?
            .trim()
            .to_string();
        let lineage = record
            .get(lineage_col)
            .ok_or_else(|| anyhow::anyhow!("Missing lineage in metadata row"))?
            .trim()
            .to_string();

        if genome_id.is_empty() {
            log::warn!("Skipping metadata row with empty genome ID.");
            continue;
        }
        if lineage.is_empty() {
            log::warn!("Genome '{}' has an empty lineage in metadata.", genome_id);
        }

        metadata.add_genome(&genome_id, &lineage);
    }

    if metadata.genome_count() == 0 {
        return Err(anyhow::anyhow!(
            "No valid genome entries found in metadata file '{}'",
            path.display()
        ));
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn create_test_metadata_file(path: &Path, content: &str) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "{}", content).unwrap();
    }

    #[test]
    fn test_load_metadata_basic() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("metadata.csv");
        create_test_metadata_file(
            &file_path,
            "Genome,Lineage,Source\nG1,1,human\nG2,2,bovine\nG3,1,human",
        );

        let metadata = load_metadata(&file_path).unwrap();

        assert_eq!(metadata.genome_count(), 3);
        assert_eq!(metadata.lineage_of("G1"), Some("1"));
        assert_eq!(metadata.lineage_of("G2"), Some("2"));
        assert_eq!(metadata.lineage_of("G3"), Some("1"));
        assert_eq!(metadata.lineage_of("G4"), None);
    }

    #[test]
    fn test_load_metadata_missing_columns() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("invalid.csv");
        create_test_metadata_file(&file_path, "Genome,OtherField\nG1,Value1\n");
        assert!(load_metadata(&file_path).is_err());

        let file_path2 = dir.path().join("valid_alt_names.csv");
        create_test_metadata_file(&file_path2, "sampleid,clade\nG1,A\n");
        assert!(load_metadata(&file_path2).is_ok());
    }

    #[test]
    fn test_empty_lineage_is_unassigned() {
        let mut metadata = Metadata::new();
        metadata.add_genome("G1", "");
        metadata.add_genome("G2", "5");
        assert_eq!(metadata.lineage_of("G1"), None);
        assert_eq!(metadata.lineage_of("G2"), Some("5"));
        assert_eq!(metadata.genome_count(), 2);
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Metadata::new();
        base.add_genome("G1", "1");
        base.add_genome("G2", "2");
        let mut overlay = Metadata::new();
        overlay.add_genome("G2", "3");
        base.merge(&overlay);
        assert_eq!(base.lineage_of("G1"), Some("1"));
        assert_eq!(base.lineage_of("G2"), Some("3"));
    }
}
