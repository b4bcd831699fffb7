pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::{IngestionTuning, PipelineConfig, WorkerTuning};
pub use orchestrator::{IngestOutcome, Orchestrator};
