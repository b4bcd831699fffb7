//! `DocumentGate` (§4.1) and `Orchestrator` (§4.7): the idempotency gate and
//! the per-document, per-batch store-as-you-go driver wiring C2-C6.

use std::sync::Arc;

use common::error::AppError;
use common::model::{Document, DocumentStatus, Entity, ProcessingStatus, Relation};
use common::ports::{ChunkKvStore, DocStatusStore, EmbedderPort, GraphStore, VectorStore};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use state_machines::core::GuardError;

use crate::chunking::chunk_document;
use crate::embedding::embed_chunks;
use crate::extraction::KgExtractor;
use crate::persistence::KgPersister;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::state;

/// Aggregate counts returned from one `ingest` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOutcome {
    pub chunk_count: usize,
    pub entity_count: usize,
    pub relation_count: usize,
}

pub struct Orchestrator {
    doc_status: Arc<dyn DocStatusStore>,
    chunk_kv: Arc<dyn ChunkKvStore>,
    embedder: Arc<dyn EmbedderPort>,
    chunk_vectors: Arc<dyn VectorStore>,
    extractor: Arc<KgExtractor>,
    persister: Arc<KgPersister>,
    config: PipelineConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        doc_status: Arc<dyn DocStatusStore>,
        chunk_kv: Arc<dyn ChunkKvStore>,
        embedder: Arc<dyn EmbedderPort>,
        chunk_vectors: Arc<dyn VectorStore>,
        extractor: Arc<KgExtractor>,
        persister: Arc<KgPersister>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            doc_status,
            chunk_kv,
            embedder,
            chunk_vectors,
            extractor,
            persister,
            config,
        }
    }

    /// DocumentGate + Orchestrator entry point (§4.1, §4.7). Idempotent:
    /// a document already `Completed` or `Processing` returns immediately
    /// without re-running the pipeline.
    ///
    /// # Errors
    /// Propagates the first fatal error from chunking, embedding or
    /// persistence, after transitioning the document to `Failed`.
    #[instrument(skip(self, document), fields(doc_id = %document.id))]
    pub async fn ingest(&self, document: &Document) -> Result<IngestOutcome, AppError> {
        let doc_id = document.id.clone();

        let existing = self.doc_status.get_status(&doc_id).await?;
        if let Some(existing) = &existing {
            match existing.status {
                ProcessingStatus::Completed => {
                    info!(%doc_id, "document already completed, skipping re-ingest");
                    return Ok(IngestOutcome {
                        chunk_count: existing.chunk_count,
                        entity_count: existing.entity_count,
                        relation_count: existing.relation_count,
                    });
                }
                ProcessingStatus::Processing => {
                    info!(%doc_id, "document already in progress, skipping concurrent ingest");
                    return Ok(IngestOutcome::default());
                }
                ProcessingStatus::Pending | ProcessingStatus::Failed => {}
            }
        }

        let project_id = document.project_id().ok_or_else(|| {
            AppError::ContractViolation("document metadata is missing project_id".into())
        })?;

        let mut status = existing
            .unwrap_or_else(|| DocumentStatus::pending(doc_id.clone(), document.filepath().map(str::to_string)));
        status.mark_processing();
        self.doc_status.set_status(status.clone()).await?;

        match self.run_pipeline(document, project_id).await {
            Ok(outcome) => {
                status.mark_completed(outcome.chunk_count, outcome.entity_count, outcome.relation_count);
                self.doc_status.set_status(status).await?;
                Ok(outcome)
            }
            Err(err) => {
                status.mark_failed(err.to_string());
                if let Err(write_err) = self.doc_status.set_status(status).await {
                    warn!(%doc_id, error = %write_err, "failed to persist FAILED status after pipeline error");
                }
                Err(err)
            }
        }
    }

    /// Drives one document through the typestate-enforced stage sequence
    /// (§4.7): `Ready -> Chunked -> ChunksEmbedded -> GraphBuilt`. The
    /// typestate itself carries no payload; it exists so the stage methods'
    /// signatures are the thing preventing e.g. persisting before chunking,
    /// the same compile-time ordering guarantee the reference crate gets
    /// from threading its own `IngestionMachine` through `prepare_content` /
    /// `retrieve_related` / `enrich` / `persist`.
    async fn run_pipeline(&self, document: &Document, project_id: &str) -> Result<IngestOutcome, AppError> {
        let machine = state::ready();

        let chunks = chunk_document(
            &document.id,
            &document.content,
            self.config.ingestion.chunk_size,
            self.config.ingestion.chunk_overlap,
        )?;
        let machine = machine.chunk().map_err(|(_, guard)| map_guard_error("chunk", &guard))?;

        if chunks.is_empty() {
            return Ok(IngestOutcome::default());
        }

        embed_chunks(
            &chunks,
            Some(project_id),
            document.document_id(),
            self.config.ingestion.embedding_batch_size,
            self.config.ingestion.embedding_concurrency,
            self.chunk_kv.as_ref(),
            self.embedder.as_ref(),
            self.chunk_vectors.as_ref(),
        )
        .await?;
        let machine = machine
            .embed_chunks()
            .map_err(|(_, guard)| map_guard_error("embed_chunks", &guard))?;

        let mut total_entities = 0usize;
        let mut total_relations = 0usize;

        for batch in chunks.chunks(self.config.ingestion.kg_extraction_batch_size) {
            let (entities, relations) = self.extract_batch(batch, project_id).await;
            total_entities += entities.len();
            total_relations += relations.len();
            self.persister
                .persist(project_id, document.document_id(), entities, relations)
                .await?;
        }

        let _machine = machine
            .build_graph()
            .map_err(|(_, guard)| map_guard_error("build_graph", &guard))?;

        Ok(IngestOutcome {
            chunk_count: chunks.len(),
            entity_count: total_entities,
            relation_count: total_relations,
        })
    }

    /// Fans out `KGExtractor` calls within one KG batch (bounded by
    /// `extraction_concurrency`), then concatenates results. No ordering
    /// among chunks within a batch (§5).
    async fn extract_batch(
        &self,
        batch: &[common::model::Chunk],
        project_id: &str,
    ) -> (Vec<Entity>, Vec<Relation>) {
        let concurrency = self.config.ingestion.extraction_concurrency.max(1);
        let results: Vec<(Vec<Entity>, Vec<Relation>)> = stream::iter(batch.iter().map(|chunk| {
            let extractor = Arc::clone(&self.extractor);
            async move { extractor.extract_chunk(chunk, project_id).await }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let mut entities = Vec::new();
        let mut relations = Vec::new();
        for (chunk_entities, chunk_relations) in results {
            entities.extend(chunk_entities);
            relations.extend(chunk_relations);
        }
        (entities, relations)
    }
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::ContractViolation(format!("invalid ingestion pipeline transition during {event}: {guard:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ports::testing::{
        HashEmbedder, InMemoryChunkKvStore, InMemoryDocStatusStore, InMemoryExtractionCache,
        InMemoryGraphStore, InMemoryVectorStore, ScriptedLlm,
    };
    use std::collections::HashMap;

    fn build_orchestrator(
        llm_responses: Vec<String>,
    ) -> (Orchestrator, Arc<InMemoryGraphStore>, Arc<InMemoryDocStatusStore>) {
        let doc_status = Arc::new(InMemoryDocStatusStore::default());
        let chunk_kv = Arc::new(InMemoryChunkKvStore::default());
        let embedder = Arc::new(HashEmbedder::new(8));
        let chunk_vectors = Arc::new(InMemoryVectorStore::default());
        let graph_store = Arc::new(InMemoryGraphStore::default());
        let entity_vectors = Arc::new(InMemoryVectorStore::default());

        let extractor = Arc::new(KgExtractor::new(
            Arc::new(ScriptedLlm::new(llm_responses)),
            Some(Arc::new(InMemoryExtractionCache::default())),
            crate::extraction::ExtractionTuning {
                gleaning_enabled: false,
                ..Default::default()
            },
        ));
        let persister = Arc::new(KgPersister::new(
            graph_store.clone(),
            entity_vectors,
            embedder.clone(),
            None,
            crate::persistence::PersisterTuning::default(),
        ));

        let mut config = PipelineConfig::default();
        config.ingestion.chunk_size = 20;
        config.ingestion.chunk_overlap = 5;

        let orchestrator = Orchestrator::new(
            doc_status.clone(),
            chunk_kv,
            embedder,
            chunk_vectors,
            extractor,
            persister,
            config,
        );
        (orchestrator, graph_store, doc_status)
    }

    fn document(content: &str) -> Document {
        let mut metadata = HashMap::new();
        metadata.insert("project_id".to_string(), "proj-1".to_string());
        Document {
            id: "doc-1".to_string(),
            content: content.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn happy_path_produces_chunks_entities_and_completed_status() {
        use crate::prompts::{COMPLETION_DELIMITER, TUPLE_DELIMITER};
        let record = format!(
            "entity{TUPLE_DELIMITER}ALPHA{TUPLE_DELIMITER}CONCEPT{TUPLE_DELIMITER}a concept\nrelation{TUPLE_DELIMITER}ALPHA{TUPLE_DELIMITER}BETA{TUPLE_DELIMITER}rel{TUPLE_DELIMITER}desc\n{COMPLETION_DELIMITER}"
        );
        let words: Vec<&str> = std::iter::repeat("alpha").take(60).collect();
        let content = words.join(" ");
        let (orchestrator, graph_store, doc_status) = build_orchestrator(vec![record; 8]);

        let outcome = orchestrator.ingest(&document(&content)).await.unwrap();
        assert!(outcome.chunk_count >= 3);
        assert!(outcome.entity_count >= 1);
        assert!(outcome.relation_count >= 1);
        assert!(graph_store.entity_count("proj-1") >= 1);

        let status = doc_status.get_status("doc-1").await.unwrap().unwrap();
        assert_eq!(status.status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn empty_document_completes_with_zero_counts() {
        let (orchestrator, _graph_store, doc_status) = build_orchestrator(vec![]);
        let outcome = orchestrator.ingest(&document("")).await.unwrap();
        assert_eq!(outcome.chunk_count, 0);
        assert_eq!(outcome.entity_count, 0);
        let status = doc_status.get_status("doc-1").await.unwrap().unwrap();
        assert_eq!(status.status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn missing_project_id_is_a_contract_violation() {
        let (orchestrator, _graph_store, _doc_status) = build_orchestrator(vec![]);
        let mut doc = document("hello world");
        doc.metadata.remove("project_id");
        let result = orchestrator.ingest(&doc).await;
        assert!(matches!(result, Err(AppError::ContractViolation(_))));
    }

    #[tokio::test]
    async fn re_ingest_of_completed_document_is_a_no_op() {
        use crate::prompts::{COMPLETION_DELIMITER, TUPLE_DELIMITER};
        let record = format!("entity{TUPLE_DELIMITER}ALPHA{TUPLE_DELIMITER}CONCEPT{TUPLE_DELIMITER}a concept\n{COMPLETION_DELIMITER}");
        let (orchestrator, graph_store, _doc_status) = build_orchestrator(vec![record]);
        let doc = document("alpha beta gamma");

        let first = orchestrator.ingest(&doc).await.unwrap();
        let entities_after_first = graph_store.entity_count("proj-1");
        let second = orchestrator.ingest(&doc).await.unwrap();

        assert_eq!(first.chunk_count, second.chunk_count);
        assert_eq!(first.entity_count, second.entity_count);
        assert_eq!(graph_store.entity_count("proj-1"), entities_after_first);
    }
}
