pub mod processor;
pub mod report;

pub use processor::{AnalysisInputs, AnalysisProcessor, Stage};
pub use report::generate_report;
