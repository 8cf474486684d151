//! vaultmap pipeline: parse orchestration over the indexer and layout crates

pub mod listener;
pub mod orchestrator;
pub mod progress;


pub use orchestrator::{ParseOrchestrator, StatusReport, TriggerOutcome, WaitOutcome};
pub use progress::{RunProgress, Stage};
