pub mod cache;
pub mod chunk;
pub mod cluster;
pub mod document;
pub mod entity;
pub mod relation;
pub mod similarity;
pub mod task;
pub mod vector;

pub use cache::{CacheType, ExtractionCache};
pub use chunk::Chunk;
pub use cluster::EntityCluster;
pub use document::{Document, DocumentStatus, ProcessingStatus};
pub use entity::Entity;
pub use relation::Relation;
pub use similarity::EntitySimilarityScore;
pub use task::{IngestionTask, IngestionTaskStatus, TaskErrorInfo};
pub use vector::{VectorEntry, VectorEntryMetadata, VectorKind};
