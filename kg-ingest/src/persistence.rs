//! `KGPersister` (§4.5): takes the entities and relations extracted for one
//! batch and writes them through the graph and vector ports, after optional
//! semantic dedup and mandatory exact-name dedup with description
//! accumulation.

use std::sync::Arc;

use common::error::AppError;
use common::ids::entity_vector_id;
use common::model::{Entity, Relation, VectorEntry, VectorEntryMetadata, VectorKind};
use common::ports::{EmbedderPort, GraphStore, VectorStore};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{info, warn};

use crate::resolver::EntityResolver;

const DEFAULT_DESCRIPTION_SEPARATOR: &str = " | ";
const DEFAULT_MAX_DESCRIPTION_LEN: usize = 1000;
const DEFAULT_RETRY_ATTEMPTS: usize = 3;
const DEFAULT_RETRY_BASE_MILLIS: u64 = 100;

#[derive(Debug, Clone)]
pub struct PersisterTuning {
    pub description_separator: String,
    pub max_description_len: usize,
    pub retry_attempts: usize,
    pub retry_base_millis: u64,
}

impl Default for PersisterTuning {
    fn default() -> Self {
        Self {
            description_separator: DEFAULT_DESCRIPTION_SEPARATOR.to_string(),
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_millis: DEFAULT_RETRY_BASE_MILLIS,
        }
    }
}

pub struct KgPersister {
    graph_store: Arc<dyn GraphStore>,
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbedderPort>,
    resolver: Option<Arc<EntityResolver>>,
    tuning: PersisterTuning,
}

/// Aggregate counts returned after a batch durably persists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistOutcome {
    pub entities_written: usize,
    pub relations_written: usize,
}

impl KgPersister {
    #[must_use]
    pub fn new(
        graph_store: Arc<dyn GraphStore>,
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbedderPort>,
        resolver: Option<Arc<EntityResolver>>,
        tuning: PersisterTuning,
    ) -> Self {
        Self {
            graph_store,
            vector_store,
            embedder,
            resolver,
            tuning,
        }
    }

    /// Persists one KG batch. `project_id` absence is a programmer error,
    /// not a recoverable condition, per §4.5.1.
    ///
    /// # Errors
    /// Propagates a `AppError::Port`/`AppError::ContractViolation` once the
    /// write retries (§4.5.6) are exhausted.
    ///
    /// # Panics
    /// Panics if `project_id` is empty; callers must guarantee a non-empty
    /// project scope before invoking the persister.
    pub async fn persist(
        &self,
        project_id: &str,
        document_id: Option<&str>,
        entities: Vec<Entity>,
        relations: Vec<Relation>,
    ) -> Result<PersistOutcome, AppError> {
        assert!(!project_id.is_empty(), "project_id is mandatory for KGPersister::persist");

        let entities = self.maybe_resolve(entities).await;
        let entities = dedup_by_name(entities, &self.tuning);

        let vector_entries = self.embed_entities(project_id, document_id, &entities).await?;

        let entities_written = entities.len();
        let relations_written = relations.len();

        // Entities must land before relations (some graph backends create
        // stub nodes for missing endpoints); the entity-vector upsert has no
        // such ordering dependency, so it runs concurrently with the
        // relation write rather than after it (§4.5.6, §5).
        retry_write(self.tuning.retry_attempts, self.tuning.retry_base_millis, || {
            self.graph_store.upsert_entities(project_id, entities.clone())
        })
        .await?;

        let relations_write = retry_write(self.tuning.retry_attempts, self.tuning.retry_base_millis, || {
            self.graph_store.upsert_relations(project_id, relations.clone())
        });
        let vectors_write = self.vector_store.upsert_batch(vector_entries);
        tokio::try_join!(relations_write, vectors_write)?;

        info!(
            project_id,
            entities_written, relations_written, "KG batch persisted"
        );

        Ok(PersistOutcome {
            entities_written,
            relations_written,
        })
    }

    async fn maybe_resolve(&self, entities: Vec<Entity>) -> Vec<Entity> {
        let Some(resolver) = &self.resolver else {
            return entities;
        };
        let original = entities.clone();
        let result = resolver.resolve(entities, std::time::Duration::ZERO).await;
        if result.resolved_entities.is_empty() && result.original_count > 0 {
            warn!("entity resolver produced an empty result, falling back to unresolved list");
            return original;
        }
        result.resolved_entities
    }

    async fn embed_entities(
        &self,
        project_id: &str,
        document_id: Option<&str>,
        entities: &[Entity],
    ) -> Result<Vec<VectorEntry>, AppError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let inputs: Vec<String> = entities
            .iter()
            .map(|entity| format!("{}: {}", entity.name, entity.description))
            .collect();
        let vectors = self.embedder.embed(&inputs).await?;

        Ok(entities
            .iter()
            .zip(vectors)
            .map(|(entity, vector)| VectorEntry {
                id: entity_vector_id(Some(project_id), &entity.name),
                vector,
                metadata: VectorEntryMetadata {
                    kind: VectorKind::Entity,
                    content: entity.description.clone(),
                    document_id: document_id.map(ToString::to_string),
                    chunk_index: None,
                    project_id: Some(project_id.to_string()),
                },
            })
            .collect())
    }
}

/// Wraps a graph-store write in the bounded exponential-backoff retry
/// described in §4.5.6, retrying only when the failure is classified as a
/// transient storage conflict; anything else propagates on first try.
async fn retry_write<F, Fut>(attempts: usize, base_millis: u64, operation: F) -> Result<(), AppError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<(), AppError>>,
{
    let strategy = ExponentialBackoff::from_millis(base_millis).map(jitter).take(attempts);
    RetryIf::spawn(
        strategy,
        || operation(),
        |err: &AppError| {
            let retryable = err.is_retryable_conflict();
            if retryable {
                warn!(error = %err, "retrying transient graph store conflict");
            }
            retryable
        },
    )
    .await
}

/// Exact-name deduplication with description accumulation (§4.5.3).
fn dedup_by_name(entities: Vec<Entity>, tuning: &PersisterTuning) -> Vec<Entity> {
    let mut by_name: Vec<Entity> = Vec::with_capacity(entities.len());
    for entity in entities {
        let identity = entity.identity();
        if let Some(existing) = by_name.iter_mut().find(|e: &&mut Entity| e.identity() == identity) {
            existing.description = merge_description(&existing.description, &entity.description, tuning);
            existing.source_chunk_ids.extend(&entity.source_chunk_ids);
            for alias in entity.aliases {
                if !existing.aliases.contains(&alias) {
                    existing.aliases.push(alias);
                }
            }
        } else {
            by_name.push(entity);
        }
    }
    by_name
}

fn merge_description(existing: &str, new: &str, tuning: &PersisterTuning) -> String {
    if new == existing || existing.contains(new) {
        return existing.to_string();
    }
    let candidate = format!("{existing}{}{new}", tuning.description_separator);
    if candidate.chars().count() > tuning.max_description_len {
        let keep = tuning.max_description_len.saturating_sub(3);
        let truncated: String = candidate.chars().take(keep).collect();
        format!("{truncated}...")
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::entity::DEFAULT_MAX_SOURCE_IDS;
    use common::ports::testing::{HashEmbedder, InMemoryGraphStore, InMemoryVectorStore};

    fn entity(name: &str, description: &str) -> Entity {
        Entity::new(name, Some("ORG".into()), description.into(), None, DEFAULT_MAX_SOURCE_IDS).unwrap()
    }

    #[test]
    fn merge_description_skips_identical_and_substring() {
        let tuning = PersisterTuning::default();
        assert_eq!(merge_description("a company", "a company", &tuning), "a company");
        assert_eq!(merge_description("a big company", "big company", &tuning), "a big company");
    }

    #[test]
    fn merge_description_truncates_when_over_max_len() {
        let mut tuning = PersisterTuning::default();
        tuning.max_description_len = 10;
        let merged = merge_description("0123456789", "overflow", &tuning);
        assert_eq!(merged.chars().count(), 10);
        assert!(merged.ends_with("..."));
    }

    #[test]
    fn dedup_by_name_accumulates_descriptions_for_duplicates() {
        let tuning = PersisterTuning::default();
        let entities = vec![entity("Acme", "first description"), entity("acme", "second description")];
        let deduped = dedup_by_name(entities, &tuning);
        assert_eq!(deduped.len(), 1);
        assert!(deduped[0].description.contains("first description"));
        assert!(deduped[0].description.contains("second description"));
    }

    #[tokio::test]
    async fn persist_writes_entities_before_relations_and_upserts_vectors() {
        let graph_store = Arc::new(InMemoryGraphStore::default());
        let vector_store = Arc::new(InMemoryVectorStore::default());
        let embedder = Arc::new(HashEmbedder::new(8));
        let persister = KgPersister::new(
            graph_store.clone(),
            vector_store.clone(),
            embedder,
            None,
            PersisterTuning::default(),
        );

        let entities = vec![entity("Acme", "a company")];
        let relations = vec![Relation::new("Acme", "Globex", "owns".into(), String::new(), None, DEFAULT_MAX_SOURCE_IDS).unwrap()];

        let outcome = persister.persist("proj-1", Some("doc-1"), entities, relations).await.unwrap();
        assert_eq!(outcome.entities_written, 1);
        assert_eq!(outcome.relations_written, 1);
        assert_eq!(graph_store.entity_count("proj-1"), 1);
        assert_eq!(graph_store.relation_count("proj-1"), 1);
        assert_eq!(vector_store.len(), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "project_id is mandatory")]
    async fn persist_panics_on_empty_project_id() {
        let graph_store = Arc::new(InMemoryGraphStore::default());
        let vector_store = Arc::new(InMemoryVectorStore::default());
        let embedder = Arc::new(HashEmbedder::new(8));
        let persister = KgPersister::new(graph_store, vector_store, embedder, None, PersisterTuning::default());
        let _ = persister.persist("", None, Vec::new(), Vec::new()).await;
    }
}
