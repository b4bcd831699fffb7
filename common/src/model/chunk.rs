use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token-bounded slice of a document. Created by the chunker, immutable
/// thereafter. Ownership lives in the KV chunk store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub source_doc_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub token_count: usize,
}
