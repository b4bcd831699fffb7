use crate::bounded::BoundedIdSet;
use crate::text::normalize;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_NAME_MAX_LEN: usize = 500;
pub const DEFAULT_DESCRIPTION_MAX_LEN: usize = 1000;
pub const DEFAULT_MAX_SOURCE_IDS: usize = 50;
pub const DEFAULT_ENTITY_TYPE: &str = "CONCEPT";

/// A knowledge-graph entity. Identity within a project is `normalize(name)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: Option<String>,
    pub description: String,
    pub source_chunk_ids: BoundedIdSet,
    pub filepath: Option<String>,
    pub document_id: Option<String>,
    /// Other names this entity was known by before semantic dedup merged
    /// them into this canonical record. Empty for entities that were never
    /// part of a multi-member cluster.
    pub aliases: Vec<String>,
}

impl Entity {
    /// Builds a new entity, clamping name/description length and assigning
    /// the default type when absent. Returns `None` when the normalized name
    /// is empty (the caller should drop the record, per the validation rules).
    #[must_use]
    pub fn new(
        name: &str,
        entity_type: Option<String>,
        description: String,
        source_chunk_id: Option<Uuid>,
        max_source_ids: usize,
    ) -> Option<Self> {
        let name = name.chars().take(DEFAULT_NAME_MAX_LEN).collect::<String>();
        if normalize(&name).is_empty() {
            return None;
        }
        let entity_type = match entity_type {
            Some(t) if !t.trim().is_empty() => Some(t),
            _ => Some(DEFAULT_ENTITY_TYPE.to_string()),
        };
        let description = description
            .chars()
            .take(DEFAULT_DESCRIPTION_MAX_LEN)
            .collect::<String>();
        let mut source_chunk_ids = BoundedIdSet::new(max_source_ids);
        if let Some(id) = source_chunk_id {
            source_chunk_ids.push(id);
        }
        Some(Self {
            name,
            entity_type,
            description,
            source_chunk_ids,
            filepath: None,
            document_id: None,
            aliases: Vec::new(),
        })
    }

    /// The project-scoped identity of this entity.
    #[must_use]
    pub fn identity(&self) -> String {
        normalize(&self.name)
    }

    /// Attaches aliases (other cluster member names), truncated to
    /// `max_aliases`.
    #[must_use]
    pub fn with_aliases(mut self, mut aliases: Vec<String>, max_aliases: usize) -> Self {
        aliases.truncate(max_aliases);
        self.aliases = aliases;
        self
    }

    #[must_use]
    pub fn resolved_type(&self) -> &str {
        self.entity_type.as_deref().unwrap_or(DEFAULT_ENTITY_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_rejected() {
        assert!(Entity::new("   ", None, String::new(), None, 50).is_none());
    }

    #[test]
    fn missing_type_defaults_to_concept() {
        let entity = Entity::new("Acme", None, "a company".into(), None, 50).unwrap();
        assert_eq!(entity.resolved_type(), "CONCEPT");
    }

    #[test]
    fn name_and_description_are_clamped() {
        let long_name = "a".repeat(DEFAULT_NAME_MAX_LEN + 10);
        let long_description = "b".repeat(DEFAULT_DESCRIPTION_MAX_LEN + 10);
        let entity = Entity::new(&long_name, Some("ORG".into()), long_description, None, 50).unwrap();
        assert_eq!(entity.name.chars().count(), DEFAULT_NAME_MAX_LEN);
        assert_eq!(entity.description.chars().count(), DEFAULT_DESCRIPTION_MAX_LEN);
    }
}
