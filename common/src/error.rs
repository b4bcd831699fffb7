use thiserror::Error;

/// Error taxonomy for the ingestion and knowledge-graph construction subsystem.
///
/// Configuration errors are fatal at startup. Contract violations are fatal
/// for the current document. Port and parse failures are either swallowed
/// locally (one chunk, one gleaning pass) or propagated to the document
/// boundary depending on where they occur; see the pipeline's error handling
/// design for the exact propagation policy.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("port failure: {0}")]
    Port(String),

    #[error("parse failure: {0}")]
    Parse(String),

    #[error("document ingestion failed: {0}")]
    Document(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Whether retrying the operation that produced this error is plausible.
    ///
    /// Used by the graph-write retry loop to distinguish a transient storage
    /// conflict from a fatal contract violation.
    #[must_use]
    pub fn is_retryable_conflict(&self) -> bool {
        match self {
            AppError::Port(message) => message.contains("conflict") || message.contains("busy"),
            _ => false,
        }
    }
}
