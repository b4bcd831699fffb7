use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A unit of work consumed by the worker loop. A thin wrapper around a
/// document ingestion request; all knowledge-graph semantics live in the
/// orchestrator this task ultimately drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionTask {
    pub id: Uuid,
    pub doc_id: String,
    pub content: String,
    pub project_id: String,
    pub metadata: HashMap<String, String>,
    pub status: IngestionTaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskErrorInfo {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IngestionTaskStatus {
    Pending,
    Processing,
    Succeeded,
    Failed(TaskErrorInfo),
    DeadLetter(TaskErrorInfo),
}

impl IngestionTask {
    #[must_use]
    pub fn new(
        doc_id: String,
        content: String,
        project_id: String,
        metadata: HashMap<String, String>,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            doc_id,
            content,
            project_id,
            metadata,
            status: IngestionTaskStatus::Pending,
            attempts: 0,
            max_attempts,
            worker_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_processing(&mut self, worker_id: &str) {
        self.attempts = self.attempts.saturating_add(1);
        self.status = IngestionTaskStatus::Processing;
        self.worker_id = Some(worker_id.to_string());
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn mark_succeeded(&mut self) {
        self.status = IngestionTaskStatus::Succeeded;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, info: TaskErrorInfo) {
        self.status = IngestionTaskStatus::Failed(info);
        self.updated_at = Utc::now();
    }

    pub fn mark_dead_letter(&mut self, info: TaskErrorInfo) {
        self.status = IngestionTaskStatus::DeadLetter(info);
        self.updated_at = Utc::now();
    }
}
