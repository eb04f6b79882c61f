// Event pipeline: ingestion, processing, and the run that ties them together

pub mod ingestion;
pub mod processing;
pub mod run;

pub use run::{EventRun, RunReport, RunStage, RunSummary};
