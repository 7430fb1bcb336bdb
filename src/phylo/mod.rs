//! Phylogenetic tree handling.
//!
//! A small arena-backed rooted tree, a Newick reader, and the operations the
//! analysis needs: node lookup by label, node deletion, and cophenetic
//! distance between labelled nodes.

pub mod newick;
pub mod tree;

pub use newick::read_newick_file;
pub use tree::{NodeId, PhyloTree};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Newick parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("No node labelled '{0}' in tree")]
    UnknownLabel(String),

    #[error("Label '{0}' matches more than one node")]
    AmbiguousLabel(String),
}
