//! C3: batches chunks through the embedding port and upserts the resulting
//! vectors, store-as-you-go style.

use common::error::AppError;
use common::model::{Chunk, VectorEntry, VectorEntryMetadata, VectorKind};
use common::ports::{ChunkKvStore, EmbedderPort, VectorStore};
use futures::stream::{self, StreamExt, TryStreamExt};

/// Writes chunk content to the KV store and embeds chunks in fixed-size
/// batches, then performs a single bulk upsert to the chunk-vector store.
///
/// Chunk content writes may overlap embedding batches; the final bulk vector
/// upsert does not begin until every embedding batch has completed, and
/// per-batch ordering of the returned vectors is preserved.
pub async fn embed_chunks(
    chunks: &[Chunk],
    project_id: Option<&str>,
    document_id: Option<&str>,
    batch_size: usize,
    embedding_concurrency: usize,
    kv_store: &dyn ChunkKvStore,
    embedder: &dyn EmbedderPort,
    vector_store: &dyn VectorStore,
) -> Result<(), AppError> {
    if chunks.is_empty() {
        return Ok(());
    }

    let write_futures = chunks
        .iter()
        .map(|chunk| kv_store.set(chunk.chunk_id, &chunk.content));
    stream::iter(write_futures)
        .buffer_unordered(embedding_concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await?;

    let batch_size = batch_size.max(1);
    let batches: Vec<&[Chunk]> = chunks.chunks(batch_size).collect();

    let embedded_batches: Vec<Vec<Vec<f32>>> = stream::iter(batches.iter().map(|batch| {
        let inputs: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
        async move { embedder.embed(&inputs).await }
    }))
    .buffered(embedding_concurrency.max(1))
    .try_collect()
    .await?;

    // `buffered` (unlike `buffer_unordered`) yields results in input order,
    // so each batch's vectors are paired with that same batch's chunks here.
    let mut entries = Vec::with_capacity(chunks.len());
    for (batch, vectors) in batches.iter().zip(embedded_batches.iter()) {
        if vectors.len() != batch.len() {
            return Err(AppError::Port(format!(
                "embedder returned {} vectors for a batch of {} chunks",
                vectors.len(),
                batch.len()
            )));
        }
        for (chunk, vector) in batch.iter().zip(vectors.iter()) {
            entries.push(VectorEntry {
                id: chunk.chunk_id,
                vector: vector.clone(),
                metadata: VectorEntryMetadata {
                    kind: VectorKind::Chunk,
                    content: chunk.content.clone(),
                    document_id: document_id.map(str::to_string),
                    chunk_index: Some(chunk.chunk_index),
                    project_id: project_id.map(str::to_string),
                },
            });
        }
    }

    vector_store.upsert_batch(entries).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ports::testing::{HashEmbedder, InMemoryChunkKvStore, InMemoryVectorStore};
    use uuid::Uuid;

    fn sample_chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                chunk_id: Uuid::new_v4(),
                source_doc_id: "doc-1".into(),
                chunk_index: i,
                content: format!("chunk body {i}"),
                token_count: 3,
            })
            .collect()
    }

    #[tokio::test]
    async fn embeds_and_upserts_all_chunks_in_order() {
        let chunks = sample_chunks(7);
        let kv = InMemoryChunkKvStore::default();
        let embedder = HashEmbedder::new(8);
        let vectors = InMemoryVectorStore::default();

        embed_chunks(
            &chunks,
            Some("proj-1"),
            Some("doc-1"),
            3,
            4,
            &kv,
            &embedder,
            &vectors,
        )
        .await
        .unwrap();

        assert_eq!(vectors.len(), 7);
        for chunk in &chunks {
            let stored = vectors.get(chunk.chunk_id).expect("vector stored");
            assert_eq!(stored.metadata.chunk_index, Some(chunk.chunk_index));
            assert_eq!(kv.get(chunk.chunk_id).await.unwrap().unwrap(), chunk.content);
        }
    }

    #[tokio::test]
    async fn empty_chunk_list_is_a_no_op() {
        let kv = InMemoryChunkKvStore::default();
        let embedder = HashEmbedder::new(4);
        let vectors = InMemoryVectorStore::default();
        embed_chunks(&[], None, None, 32, 4, &kv, &embedder, &vectors)
            .await
            .unwrap();
        assert!(vectors.is_empty());
    }
}
