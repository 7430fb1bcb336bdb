//! Lineage-level gene co-occurrence analysis.
//!
//! Turns a gene presence/absence matrix into per-lineage gene frequencies,
//! ranks genes by correlation with a reference gene, and compares the
//! functional similarity of lineages with their distance on a phylogeny.

mod cli;
mod comparison;
mod config;
mod error;
mod frequency;
mod io;
mod metadata;
mod normalization;
mod phylo;
mod pipeline;
mod presence;
mod stats;
mod visualization;

use anyhow::Result;
use clap::Parser;
use cli::{run_cli, Cli};
use log::info;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting analysis with arguments: {:?}", cli);

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()?;
    info!("Using {} threads.", cli.threads);

    run_cli(cli)?;

    info!("Analysis finished successfully.");
    Ok(())
}
