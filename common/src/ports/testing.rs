//! In-memory fakes for every capability port, good enough to drive the whole
//! pipeline in `#[tokio::test]`s without a real LLM, embedder or database.

use super::{
    ChunkKvStore, DocStatusStore, EmbedderPort, ExtractionCachePort, GraphStore,
    IngestionTaskQueue, LlmPort, VectorStore,
};
use crate::error::AppError;
use crate::model::{
    CacheType, DocumentStatus, Entity, IngestionTask, IngestionTaskStatus, Relation, VectorEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryDocStatusStore {
    statuses: Mutex<HashMap<String, DocumentStatus>>,
}

#[async_trait]
impl DocStatusStore for InMemoryDocStatusStore {
    async fn get_status(&self, doc_id: &str) -> Result<Option<DocumentStatus>, AppError> {
        Ok(self.statuses.lock().expect("lock poisoned").get(doc_id).cloned())
    }

    async fn set_status(&self, status: DocumentStatus) -> Result<(), AppError> {
        self.statuses
            .lock()
            .expect("lock poisoned")
            .insert(status.doc_id.clone(), status);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChunkKvStore {
    content: Mutex<HashMap<Uuid, String>>,
}

#[async_trait]
impl ChunkKvStore for InMemoryChunkKvStore {
    async fn set(&self, id: Uuid, content: &str) -> Result<(), AppError> {
        self.content
            .lock()
            .expect("lock poisoned")
            .insert(id, content.to_string());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self.content.lock().expect("lock poisoned").get(&id).cloned())
    }
}

/// Records every upserted [`VectorEntry`], keyed by id so repeated upserts
/// of the same id overwrite rather than accumulate, mirroring the real
/// idempotent-by-id contract.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: Mutex<HashMap<Uuid, VectorEntry>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<VectorEntry> {
        self.entries.lock().expect("lock poisoned").get(&id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_batch(&self, entries: Vec<VectorEntry>) -> Result<(), AppError> {
        let mut guard = self.entries.lock().expect("lock poisoned");
        for entry in entries {
            guard.insert(entry.id, entry);
        }
        Ok(())
    }
}

/// Keeps entities keyed by `(project_id, normalized name)` so repeated
/// upserts overwrite in place, and relations as a flat, append-only list.
#[derive(Default)]
pub struct InMemoryGraphStore {
    entities: Mutex<HashMap<(String, String), Entity>>,
    relations: Mutex<Vec<(String, Relation)>>,
}

impl InMemoryGraphStore {
    #[must_use]
    pub fn entity_count(&self, project_id: &str) -> usize {
        self.entities
            .lock()
            .expect("lock poisoned")
            .keys()
            .filter(|(project, _)| project == project_id)
            .count()
    }

    #[must_use]
    pub fn relation_count(&self, project_id: &str) -> usize {
        self.relations
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter(|(project, _)| project == project_id)
            .count()
    }

    #[must_use]
    pub fn entity(&self, project_id: &str, name: &str) -> Option<Entity> {
        let key = (project_id.to_string(), crate::text::normalize(name));
        self.entities.lock().expect("lock poisoned").get(&key).cloned()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_entities(
        &self,
        project_id: &str,
        entities: Vec<Entity>,
    ) -> Result<(), AppError> {
        let mut guard = self.entities.lock().expect("lock poisoned");
        for entity in entities {
            let key = (project_id.to_string(), entity.identity());
            guard.insert(key, entity);
        }
        Ok(())
    }

    async fn upsert_relations(
        &self,
        project_id: &str,
        relations: Vec<Relation>,
    ) -> Result<(), AppError> {
        let mut guard = self.relations.lock().expect("lock poisoned");
        for relation in relations {
            guard.push((project_id.to_string(), relation));
        }
        Ok(())
    }
}

type CacheKey = (String, CacheType, String);

#[derive(Default)]
pub struct InMemoryExtractionCache {
    entries: Mutex<HashMap<CacheKey, String>>,
}

#[async_trait]
impl ExtractionCachePort for InMemoryExtractionCache {
    async fn get(
        &self,
        project_id: &str,
        cache_type: CacheType,
        content_hash: &str,
    ) -> Result<Option<String>, AppError> {
        let key = (project_id.to_string(), cache_type, content_hash.to_string());
        Ok(self.entries.lock().expect("lock poisoned").get(&key).cloned())
    }

    async fn store(
        &self,
        project_id: &str,
        cache_type: CacheType,
        content_hash: &str,
        result: &str,
    ) -> Result<(), AppError> {
        let key = (project_id.to_string(), cache_type, content_hash.to_string());
        self.entries
            .lock()
            .expect("lock poisoned")
            .insert(key, result.to_string());
        Ok(())
    }
}

/// A fake LLM that replays a fixed queue of scripted responses, one per
/// call, falling back to an empty completion once exhausted rather than
/// panicking — a test asserting on gleaning early-stop relies on this to
/// model "the model has nothing more to say".
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    #[must_use]
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn call(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, AppError> {
        let mut guard = self.responses.lock().expect("lock poisoned");
        Ok(guard.pop_front().unwrap_or_default())
    }
}

/// An `LlmPort` that always fails, used to exercise the "chunk LLM failure
/// degrades to empty extraction" boundary behavior.
pub struct FailingLlm;

#[async_trait]
impl LlmPort for FailingLlm {
    async fn call(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String, AppError> {
        Err(AppError::Port("simulated LLM outage".into()))
    }
}

/// A deterministic embedder: every input maps to the same fixed-dimension
/// vector derived from a simple byte hash, with no network dependency.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }
}

#[async_trait]
impl EmbedderPort for HashEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        Ok(inputs.iter().map(|input| hash_vector(input, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn hash_vector(input: &str, dimension: usize) -> Vec<f32> {
    let mut state: u64 = 0xcbf2_9ce4_8422_2325;
    let mut vector = Vec::with_capacity(dimension);
    for byte in input.bytes() {
        state ^= u64::from(byte);
        state = state.wrapping_mul(0x0000_0100_0000_01b3);
    }
    for slot in 0..dimension {
        let mixed = state.wrapping_add(slot as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let normalized = ((mixed >> 40) as f32) / (u32::MAX >> 16) as f32;
        vector.push(normalized);
    }
    vector
}

/// Task queue with simple lease semantics: a claimed task is hidden from
/// other claimants until `lease` has elapsed since the claim.
#[derive(Default)]
pub struct InMemoryTaskQueue {
    tasks: Mutex<HashMap<Uuid, (IngestionTask, Option<DateTime<Utc>>)>>,
}

#[async_trait]
impl IngestionTaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: IngestionTask) -> Result<(), AppError> {
        self.tasks
            .lock()
            .expect("lock poisoned")
            .insert(task.id, (task, None));
        Ok(())
    }

    async fn claim_next_ready(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Option<IngestionTask>, AppError> {
        let mut guard = self.tasks.lock().expect("lock poisoned");
        let ready_id = guard
            .iter()
            .find(|(_, (task, leased_until))| {
                matches!(task.status, IngestionTaskStatus::Pending)
                    || leased_until.is_some_and(|expiry| expiry <= now)
            })
            .map(|(id, _)| *id);

        let Some(id) = ready_id else {
            return Ok(None);
        };

        let entry = guard.get_mut(&id).expect("checked above");
        entry.0.mark_processing(worker_id);
        entry.1 = Some(now + chrono::Duration::from_std(lease).unwrap_or_default());
        Ok(Some(entry.0.clone()))
    }

    async fn update_status(
        &self,
        task_id: Uuid,
        status: IngestionTaskStatus,
    ) -> Result<(), AppError> {
        let mut guard = self.tasks.lock().expect("lock poisoned");
        if let Some((task, _)) = guard.get_mut(&task_id) {
            task.status = status;
        }
        Ok(())
    }
}
