use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    EntityExtraction,
    Gleaning,
    Summarization,
    KeywordExtraction,
    QueryResponse,
}

/// A cached LLM result, keyed by `(project_id, cache_type, content_hash)`.
/// Mediates duplicate work across chunks/documents within a project;
/// lifecycle is cascade-deleted with the project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionCache {
    pub id: String,
    pub project_id: String,
    pub cache_type: CacheType,
    pub chunk_id: Option<String>,
    pub content_hash: String,
    pub result: String,
    pub tokens_used: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl ExtractionCache {
    #[must_use]
    pub fn hash_input(input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            ExtractionCache::hash_input("hello"),
            ExtractionCache::hash_input("hello")
        );
        assert_ne!(
            ExtractionCache::hash_input("hello"),
            ExtractionCache::hash_input("world")
        );
    }
}
