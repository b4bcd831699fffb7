use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the pipeline produced a [`VectorEntry`]: a text chunk or a
/// resolved entity. The two share a store interface but differ in id
/// derivation (see `common::ids`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorKind {
    Chunk,
    Entity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntryMetadata {
    pub kind: VectorKind,
    pub content: String,
    pub document_id: Option<String>,
    pub chunk_index: Option<usize>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub metadata: VectorEntryMetadata,
}
