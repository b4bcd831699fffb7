//! Capability ports: the narrow contracts the core ingestion pipeline
//! consumes for everything external to it (LLM, embedder, storage). Concrete
//! backends are out of scope; only the contracts live here, plus (behind
//! `test-utils`) in-memory fakes good enough to drive the whole pipeline in
//! tests.

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use crate::error::AppError;
use crate::model::{
    CacheType, DocumentStatus, IngestionTask, IngestionTaskStatus, VectorEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// `call(systemPrompt, userPrompt) -> text`. Deterministic-on-identical-input
/// is not required; retries are the port's own concern.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn call(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AppError>;
}

/// `embed(batch) -> batch of fixed-dim vectors`, order-preserving.
#[async_trait]
pub trait EmbedderPort: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError>;

    /// The fixed vector dimension produced by this instance.
    fn dimension(&self) -> usize;
}

/// Durable key-value store for chunk content, keyed by chunk id.
#[async_trait]
pub trait ChunkKvStore: Send + Sync {
    async fn set(&self, id: Uuid, content: &str) -> Result<(), AppError>;
    async fn get(&self, id: Uuid) -> Result<Option<String>, AppError>;
}

/// Shared interface for the chunk- and entity-vector stores. Upsert is
/// idempotent by id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert_batch(&self, entries: Vec<VectorEntry>) -> Result<(), AppError>;
}

/// `upsertEntities`/`upsertRelations`, scoped per project; entity identity is
/// `(project_id, name)`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_entities(
        &self,
        project_id: &str,
        entities: Vec<crate::model::Entity>,
    ) -> Result<(), AppError>;

    async fn upsert_relations(
        &self,
        project_id: &str,
        relations: Vec<crate::model::Relation>,
    ) -> Result<(), AppError>;
}

/// Serializable-per-`doc_id` status store backing `DocumentGate`.
#[async_trait]
pub trait DocStatusStore: Send + Sync {
    async fn get_status(&self, doc_id: &str) -> Result<Option<DocumentStatus>, AppError>;
    async fn set_status(&self, status: DocumentStatus) -> Result<(), AppError>;
}

/// Extraction cache port. At-most-one-wins on concurrent stores is
/// sufficient; it is never required for correctness, only for avoiding
/// duplicate LLM calls.
#[async_trait]
pub trait ExtractionCachePort: Send + Sync {
    async fn get(
        &self,
        project_id: &str,
        cache_type: CacheType,
        content_hash: &str,
    ) -> Result<Option<String>, AppError>;

    async fn store(
        &self,
        project_id: &str,
        cache_type: CacheType,
        content_hash: &str,
        result: &str,
    ) -> Result<(), AppError>;
}

/// Task queue backing the worker loop. A claimed task is invisible to other
/// claimants until its lease expires.
#[async_trait]
pub trait IngestionTaskQueue: Send + Sync {
    async fn enqueue(&self, task: IngestionTask) -> Result<(), AppError>;

    async fn claim_next_ready(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<IngestionTask>, AppError>;

    async fn update_status(
        &self,
        task_id: Uuid,
        status: IngestionTaskStatus,
    ) -> Result<(), AppError>;
}

/// Documented extension point for reclaiming documents stuck in
/// `Processing` past a TTL (see the open question on lease/TTL reaping).
/// No concrete scheduler is built against this port; it exists so an
/// operator tool can be wired in later without changing core semantics.
#[async_trait]
pub trait DocStatusReaper: Send + Sync {
    async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<String>, AppError>;
}
