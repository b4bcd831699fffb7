use crate::bounded::BoundedIdSet;
use crate::text::normalize;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_RELATION_DESCRIPTION: &str = "RELATED_TO";
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A knowledge-graph relation between two entities, identified by name.
/// `src_name != tgt_name` after normalization is an invariant: self-loops
/// are rejected by the constructor, not patched up afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub src_name: String,
    pub tgt_name: String,
    pub description: String,
    pub keywords: String,
    pub weight: f64,
    pub source_chunk_ids: BoundedIdSet,
}

impl Relation {
    /// Builds a new relation. Returns `None` when either endpoint is empty,
    /// or when the endpoints are equal after normalization (self-loop).
    #[must_use]
    pub fn new(
        src_name: &str,
        tgt_name: &str,
        description: String,
        keywords: String,
        source_chunk_id: Option<Uuid>,
        max_source_ids: usize,
    ) -> Option<Self> {
        if src_name.trim().is_empty() || tgt_name.trim().is_empty() {
            return None;
        }
        if normalize(src_name) == normalize(tgt_name) {
            return None;
        }
        let description = if description.trim().is_empty() {
            DEFAULT_RELATION_DESCRIPTION.to_string()
        } else {
            description
        };
        let mut source_chunk_ids = BoundedIdSet::new(max_source_ids);
        if let Some(id) = source_chunk_id {
            source_chunk_ids.push(id);
        }
        Some(Self {
            src_name: src_name.to_string(),
            tgt_name: tgt_name.to_string(),
            description,
            keywords,
            weight: DEFAULT_WEIGHT,
            source_chunk_ids,
        })
    }

    /// The canonical unordered key for this relation's endpoints, used for
    /// lock keying and for gleaning's by-key new-relation detection.
    #[must_use]
    pub fn canonical_key(&self) -> (String, String) {
        let mut pair = [normalize(&self.src_name), normalize(&self.tgt_name)];
        pair.sort();
        let [a, b] = pair;
        (a, b)
    }

    /// The directional lowercase key used by gleaning to count "new"
    /// relations relative to the accumulated result (`src->tgt`).
    #[must_use]
    pub fn directional_key(&self) -> String {
        format!("{}->{}", normalize(&self.src_name), normalize(&self.tgt_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_loop_is_rejected() {
        assert!(Relation::new("Acme", "acme", "owns".into(), String::new(), None, 50).is_none());
    }

    #[test]
    fn empty_description_defaults_to_related_to() {
        let relation =
            Relation::new("Acme", "Globex", String::new(), String::new(), None, 50).unwrap();
        assert_eq!(relation.description, DEFAULT_RELATION_DESCRIPTION);
    }

    #[test]
    fn canonical_key_is_order_independent() {
        let a = Relation::new("Acme", "Globex", "x".into(), String::new(), None, 50).unwrap();
        let b = Relation::new("Globex", "Acme", "x".into(), String::new(), None, 50).unwrap();
        assert_eq!(a.canonical_key(), b.canonical_key());
    }
}
