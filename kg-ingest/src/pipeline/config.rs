//! Configuration surface (§6): a plain `Clone + Debug` struct tree with
//! `Default` impls, not a fluent builder, matching the reference crate's
//! own configuration style.

use common::error::AppError;

use crate::extraction::ExtractionTuning;
use crate::persistence::PersisterTuning;
use crate::resolver::ResolverTuning;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embedding_batch_size: usize,
    pub kg_extraction_batch_size: usize,
    pub extraction_concurrency: usize,
    pub embedding_concurrency: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        let kg_extraction_batch_size = 20;
        Self {
            chunk_size: 1200,
            chunk_overlap: 100,
            embedding_batch_size: 32,
            kg_extraction_batch_size,
            extraction_concurrency: kg_extraction_batch_size,
            embedding_concurrency: 4,
        }
    }
}

impl IngestionTuning {
    /// # Errors
    /// Returns `AppError::Configuration` when chunk bounds are inconsistent
    /// or any concurrency/batch knob is zero.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Configuration(
                "chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        if self.embedding_batch_size == 0
            || self.kg_extraction_batch_size == 0
            || self.extraction_concurrency == 0
            || self.embedding_concurrency == 0
        {
            return Err(AppError::Configuration(
                "ingestion batch/concurrency knobs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

const DEFAULT_LEASE_SECS: u64 = 300;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_IDLE_BACKOFF_MS: u64 = 500;
const DEFAULT_ERROR_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct WorkerTuning {
    pub lease_secs: u64,
    pub max_attempts: u32,
    pub idle_backoff_ms: u64,
    pub error_backoff_ms: u64,
}

impl Default for WorkerTuning {
    fn default() -> Self {
        Self {
            lease_secs: DEFAULT_LEASE_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
        }
    }
}

impl WorkerTuning {
    /// # Errors
    /// Returns `AppError::Configuration` when any knob is zero.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.lease_secs == 0 || self.max_attempts == 0 {
            return Err(AppError::Configuration(
                "worker lease_secs and max_attempts must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// The composed configuration tree for one Orchestrator instance, per §6.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub ingestion: IngestionTuning,
    pub extraction: ExtractionTuning,
    pub resolver: ResolverTuning,
    pub persister: PersisterTuning,
    pub worker: WorkerTuning,
}

impl PipelineConfig {
    /// Validates every sub-tree. Fatal at startup per §7's
    /// `ConfigurationError` taxonomy entry.
    ///
    /// # Errors
    /// Returns the first `AppError::Configuration` encountered.
    pub fn validate(&self) -> Result<(), AppError> {
        self.ingestion.validate()?;
        self.resolver.validate()?;
        self.worker.validate()?;
        if self.extraction.gleaning_max_passes > 5 {
            return Err(AppError::Configuration(
                "gleaning.max-passes must be in 0..=5".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_greater_than_chunk_size_is_rejected() {
        let mut config = PipelineConfig::default();
        config.ingestion.chunk_overlap = config.ingestion.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn gleaning_passes_above_five_is_rejected() {
        let mut config = PipelineConfig::default();
        config.extraction.gleaning_max_passes = 6;
        assert!(config.validate().is_err());
    }
}
