pub mod plotter;
pub mod tree_layout;

pub use plotter::{TreeAnnotation, TreeStyle, Visualizer};
