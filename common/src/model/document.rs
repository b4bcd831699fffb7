use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque input to the pipeline. Content is already-extracted text; the
/// concrete extraction from URLs/files/images is explicitly out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    /// Must carry `project_id`. May carry `document_id`, `filepath`.
    pub metadata: HashMap<String, String>,
}

impl Document {
    #[must_use]
    pub fn project_id(&self) -> Option<&str> {
        self.metadata.get("project_id").map(String::as_str)
    }

    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get("document_id").map(String::as_str)
    }

    #[must_use]
    pub fn filepath(&self) -> Option<&str> {
        self.metadata.get("filepath").map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Status record owned by `DocumentGate`. Transitions are monotonic except
/// `Failed -> Processing` on retry; `Completed` is terminal for idempotent
/// reingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub doc_id: String,
    pub filepath: Option<String>,
    pub status: ProcessingStatus,
    pub chunk_count: usize,
    pub entity_count: usize,
    pub relation_count: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentStatus {
    #[must_use]
    pub fn pending(doc_id: String, filepath: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            doc_id,
            filepath,
            status: ProcessingStatus::Pending,
            chunk_count: 0,
            entity_count: 0,
            relation_count: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = ProcessingStatus::Processing;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, chunk_count: usize, entity_count: usize, relation_count: usize) {
        self.status = ProcessingStatus::Completed;
        self.chunk_count = chunk_count;
        self.entity_count = entity_count;
        self.relation_count = relation_count;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, message: String) {
        self.status = ProcessingStatus::Failed;
        self.error_message = Some(message);
        self.updated_at = Utc::now();
    }
}
