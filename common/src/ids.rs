//! Deterministic identifier derivation.
//!
//! Entity vector ids must be bit-exact across re-ingests of the same
//! `(projectId, name)` pair so that the vector store upsert overwrites the
//! same row instead of accumulating duplicates. Chunk ids only need to be
//! time-ordered so a KV store backed by an ordered index can page through
//! them cheaply; a UUID v7 gives that for free.

use uuid::Uuid;

const GLOBAL_PROJECT: &str = "global";

/// Derives the namespace UUID for a project, falling back to the literal
/// `"global"` namespace when no project id is available.
fn project_namespace(project_id: Option<&str>) -> Uuid {
    let project = project_id.unwrap_or(GLOBAL_PROJECT);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, project.as_bytes())
}

/// Derives the deterministic entity-vector id for `(projectId, name)`.
///
/// Bit-exact and reproducible: the same inputs always yield the same id,
/// which is what allows re-ingesting a document to overwrite the existing
/// vector row rather than create a new one.
#[must_use]
pub fn entity_vector_id(project_id: Option<&str>, entity_name: &str) -> Uuid {
    let namespace = project_namespace(project_id);
    let name = format!(":{entity_name}");
    Uuid::new_v5(&namespace, name.as_bytes())
}

/// Generates a fresh, time-ordered chunk id.
#[must_use]
pub fn new_chunk_id() -> Uuid {
    Uuid::now_v7()
}

/// Generates a fresh random ingestion task id.
#[must_use]
pub fn new_task_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_vector_id_is_deterministic() {
        let first = entity_vector_id(Some("proj-1"), "Acme Corp");
        let second = entity_vector_id(Some("proj-1"), "Acme Corp");
        assert_eq!(first, second);
    }

    #[test]
    fn entity_vector_id_depends_on_project_and_name() {
        let base = entity_vector_id(Some("proj-1"), "Acme Corp");
        let other_project = entity_vector_id(Some("proj-2"), "Acme Corp");
        let other_name = entity_vector_id(Some("proj-1"), "Globex Corp");
        assert_ne!(base, other_project);
        assert_ne!(base, other_name);
    }

    #[test]
    fn missing_project_falls_back_to_global_namespace() {
        let without_project = entity_vector_id(None, "Acme Corp");
        let with_literal_global = entity_vector_id(Some("global"), "Acme Corp");
        assert_eq!(without_project, with_literal_global);
    }

    #[test]
    fn chunk_ids_are_distinct_v7_uuids() {
        let first = new_chunk_id();
        let second = new_chunk_id();
        assert_ne!(first, second);
        assert_eq!(first.get_version_num(), 7);
    }
}
