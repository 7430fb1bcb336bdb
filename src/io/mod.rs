//! Input/Output operations module.
//!
//! Opens (optionally gzipped) inputs and writes the tabular results of each
//! pipeline stage as CSV or JSON.

use anyhow::Result;
use flate2::read::MultiGzDecoder;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::comparison::{ComparisonSummary, PairComparison};
use crate::frequency::FrequencyTable;
use crate::presence::PresenceMatrix;
use crate::stats::GeneCorrelation;

/// Opens a file for reading, transparently decompressing `.gz` files.
pub fn open_input(path: &Path) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let is_gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn csv_writer(output_path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(output_path)?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or("NA".to_string(), |v| v.to_string())
}

/// Writes a presence matrix: `Gene` followed by genome names.
pub fn write_presence_matrix(matrix: &PresenceMatrix, output_path: &Path) -> Result<()> {
    let mut writer = csv_writer(output_path)?;

    let mut header = vec!["Gene".to_string()];
    header.extend(matrix.genome_names().iter().cloned());
    writer.write_record(&header)?;

    for (gene, row) in matrix.gene_names().iter().zip(matrix.presence.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(gene.clone());
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes a frequency table: `Gene` followed by lineage names.
pub fn write_frequency_table(table: &FrequencyTable, output_path: &Path) -> Result<()> {
    let mut writer = csv_writer(output_path)?;

    let mut header = vec!["Gene".to_string()];
    header.extend(table.lineage_names().iter().cloned());
    writer.write_record(&header)?;

    for (gene, row) in table.gene_names().iter().zip(table.frequencies.rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(gene.clone());
        record.extend(row.iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_correlations(correlations: &[GeneCorrelation], output_path: &Path) -> Result<()> {
    let mut writer = csv_writer(output_path)?;
    writer.write_record(["gene", "pearson"])?;
    for c in correlations {
        writer.write_record([c.gene.clone(), format_optional(c.pearson)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_comparisons(comparisons: &[PairComparison], output_path: &Path) -> Result<()> {
    let mut writer = csv_writer(output_path)?;
    writer.write_record(["set", "lineage_a", "lineage_b", "similarity", "distance"])?;
    for c in comparisons {
        writer.write_record([
            c.set.as_str().to_string(),
            c.lineage_a.clone(),
            c.lineage_b.clone(),
            format_optional(c.similarity),
            c.distance.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_comparison_summaries(
    summaries: &[ComparisonSummary],
    output_path: &Path,
) -> Result<()> {
    let mut writer = csv_writer(output_path)?;
    writer.write_record([
        "set",
        "pairs",
        "mean_similarity",
        "mean_distance",
        "similarity_distance_pearson",
    ])?;
    for s in summaries {
        writer.write_record([
            s.set.as_str().to_string(),
            s.pairs.to_string(),
            format_optional(s.mean_similarity),
            format_optional(s.mean_distance),
            format_optional(s.similarity_distance_pearson),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes any serializable value as pretty-printed JSON.
pub fn write_json<T: Serialize>(value: &T, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
