// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod orchestrator;
mod policy;
mod progress;

pub use orchestrator::{ExportOrchestrator, ExportRequest, ExportSummary};
pub use policy::{ExportResult, ExportState, TerminalState, Verdict};
pub use progress::{ExportStats, ProgressCallback, ProgressTracker};
