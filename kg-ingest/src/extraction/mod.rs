//! C4: `KGExtractor` — turns one chunk of text into entities and relations
//! via the LLM, with tolerant parsing and optional iterative gleaning.

pub mod parser;

use crate::extraction::parser::{parse_response, ParsedEntity, ParsedRelation};
use crate::prompts::{build_gleaning_system_prompt, build_system_prompt, gleaning_user_prompt};
use common::model::{CacheType, Chunk, Entity, ExtractionCache, Relation};
use common::ports::{ExtractionCachePort, LlmPort};
use common::text::normalize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

const INITIAL_USER_PROMPT: &str = "Extract every entity and relationship you can find from the text above.";

/// Tuning for the extractor, independent of storage/LLM wiring.
#[derive(Debug, Clone)]
pub struct ExtractionTuning {
    pub entity_types: Vec<String>,
    pub language: String,
    pub gleaning_enabled: bool,
    /// 0..5, validated at config load.
    pub gleaning_max_passes: u8,
    pub name_max_len: usize,
    pub max_source_ids: usize,
    pub enable_cache: bool,
}

impl Default for ExtractionTuning {
    fn default() -> Self {
        Self {
            entity_types: crate::prompts::DEFAULT_ENTITY_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            language: crate::prompts::DEFAULT_LANGUAGE.to_string(),
            gleaning_enabled: true,
            gleaning_max_passes: 1,
            name_max_len: common::model::entity::DEFAULT_NAME_MAX_LEN,
            max_source_ids: common::model::entity::DEFAULT_MAX_SOURCE_IDS,
            enable_cache: true,
        }
    }
}

pub struct KgExtractor {
    llm: Arc<dyn LlmPort>,
    cache: Option<Arc<dyn ExtractionCachePort>>,
    tuning: ExtractionTuning,
}

/// Accumulator of validated (post-filter) records keyed the way gleaning's
/// new-record detection requires: entities by lowercased name, relations by
/// lowercased `src->tgt`.
#[derive(Default)]
struct Accumulator {
    entities: HashMap<String, ParsedEntity>,
    relations: HashMap<String, ParsedRelation>,
}

impl KgExtractor {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmPort>,
        cache: Option<Arc<dyn ExtractionCachePort>>,
        tuning: ExtractionTuning,
    ) -> Self {
        Self { llm, cache, tuning }
    }

    /// Extracts entities and relations from one chunk. Never fails: an LLM
    /// error at any point degrades to the best accumulated result so far
    /// (possibly empty), matching §4.4.6 — a single chunk's failure must not
    /// abort the surrounding batch.
    pub async fn extract_chunk(&self, chunk: &Chunk, project_id: &str) -> (Vec<Entity>, Vec<Relation>) {
        let system_prompt = build_system_prompt(&chunk.content, &self.tuning.entity_types, &self.tuning.language);

        let Some(initial_response) = self
            .call_cached(
                project_id,
                CacheType::EntityExtraction,
                &chunk.content,
                &system_prompt,
                INITIAL_USER_PROMPT,
            )
            .await
        else {
            return (Vec::new(), Vec::new());
        };

        let outcome = parse_response(&initial_response, self.tuning.name_max_len);
        let mut accumulator = Accumulator::default();
        for entity in validate_entities(outcome.entities) {
            accumulator.entities.insert(normalize(&entity.name), entity);
        }
        for relation in validate_relations(outcome.relations) {
            accumulator
                .relations
                .insert(directional_key(&relation), relation);
        }

        let mut previous_response = initial_response;
        if self.tuning.gleaning_enabled {
            for _pass in 1..=self.tuning.gleaning_max_passes {
                let gleaning_system_prompt = build_gleaning_system_prompt(
                    &chunk.content,
                    &self.tuning.entity_types,
                    &self.tuning.language,
                    &previous_response,
                );
                let cache_input = format!("{}\u{0}{}", chunk.content, previous_response);
                let Some(response) = self
                    .call_cached(
                        project_id,
                        CacheType::Gleaning,
                        &cache_input,
                        &gleaning_system_prompt,
                        gleaning_user_prompt(),
                    )
                    .await
                else {
                    // A gleaning sub-call failure returns the accumulated result.
                    break;
                };

                let outcome = parse_response(&response, self.tuning.name_max_len);
                let new_entities = validate_entities(outcome.entities);
                let new_relations = validate_relations(outcome.relations);

                let new_entity_count = new_entities
                    .iter()
                    .filter(|e| !accumulator.entities.contains_key(&normalize(&e.name)))
                    .count();
                let new_relation_count = new_relations
                    .iter()
                    .filter(|r| !accumulator.relations.contains_key(&directional_key(r)))
                    .count();

                if new_entity_count == 0 && new_relation_count == 0 {
                    break; // EARLY_STOP
                }

                for entity in new_entities {
                    merge_entity(&mut accumulator.entities, entity);
                }
                for relation in new_relations {
                    merge_relation(&mut accumulator.relations, relation);
                }

                previous_response = response;
            }
        }

        let entities = accumulator
            .entities
            .into_values()
            .filter_map(|parsed| {
                Entity::new(
                    &parsed.name,
                    Some(parsed.entity_type),
                    parsed.description,
                    Some(chunk.chunk_id),
                    self.tuning.max_source_ids,
                )
            })
            .collect();

        let relations = accumulator
            .relations
            .into_values()
            .filter_map(|parsed| {
                Relation::new(
                    &parsed.src,
                    &parsed.tgt,
                    parsed.description,
                    parsed.keywords,
                    Some(chunk.chunk_id),
                    self.tuning.max_source_ids,
                )
            })
            .collect();

        (entities, relations)
    }

    /// Wraps a single LLM call site with the cache lookup/store described
    /// in §4.4's ambient extraction-cache wiring. Returns `None` (rather
    /// than propagating) when the live call fails, since every caller of
    /// this helper treats an LLM failure as a degrade-to-empty / stop point.
    async fn call_cached(
        &self,
        project_id: &str,
        cache_type: CacheType,
        cache_input: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Option<String> {
        let content_hash = ExtractionCache::hash_input(cache_input);

        if self.tuning.enable_cache {
            if let Some(cache) = &self.cache {
                match cache.get(project_id, cache_type, &content_hash).await {
                    Ok(Some(cached)) => return Some(cached),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "extraction cache lookup failed; falling through to live call"),
                }
            }
        }

        match self.llm.call(system_prompt, user_prompt).await {
            Ok(response) => {
                if self.tuning.enable_cache {
                    if let Some(cache) = &self.cache {
                        if let Err(err) = cache.store(project_id, cache_type, &content_hash, &response).await {
                            warn!(error = %err, "extraction cache store failed");
                        }
                    }
                }
                Some(response)
            }
            Err(err) => {
                warn!(error = %err, cache_type = ?cache_type, "LLM call failed; degrading to accumulated extraction");
                None
            }
        }
    }
}

fn directional_key(relation: &ParsedRelation) -> String {
    format!("{}->{}", normalize(&relation.src), normalize(&relation.tgt))
}

/// Drops entities with empty normalized name; defaults empty type to
/// `"CONCEPT"` (§4.4.4).
fn validate_entities(entities: Vec<ParsedEntity>) -> Vec<ParsedEntity> {
    entities
        .into_iter()
        .filter(|e| !normalize(&e.name).is_empty())
        .map(|mut e| {
            if e.entity_type.trim().is_empty() {
                e.entity_type = common::model::entity::DEFAULT_ENTITY_TYPE.to_string();
            }
            e
        })
        .collect()
}

/// Drops relations with an empty endpoint or a self-loop after
/// normalization; defaults empty description to `"RELATED_TO"` (§4.4.4).
fn validate_relations(relations: Vec<ParsedRelation>) -> Vec<ParsedRelation> {
    relations
        .into_iter()
        .filter(|r| !r.src.trim().is_empty() && !r.tgt.trim().is_empty())
        .filter(|r| normalize(&r.src) != normalize(&r.tgt))
        .map(|mut r| {
            if r.description.trim().is_empty() {
                r.description = common::model::relation::DEFAULT_RELATION_DESCRIPTION.to_string();
            }
            r
        })
        .collect()
}

/// Union-by-key merge keeping the record with the longer description, per
/// §4.4.5's deliberate deviation from a first-wins policy.
fn merge_entity(map: &mut HashMap<String, ParsedEntity>, incoming: ParsedEntity) {
    let key = normalize(&incoming.name);
    map.entry(key)
        .and_modify(|existing| {
            if incoming.description.len() > existing.description.len() {
                *existing = incoming.clone();
            }
        })
        .or_insert(incoming);
}

fn merge_relation(map: &mut HashMap<String, ParsedRelation>, incoming: ParsedRelation) {
    let key = directional_key(&incoming);
    map.entry(key)
        .and_modify(|existing| {
            if incoming.description.len() > existing.description.len() {
                *existing = incoming.clone();
            }
        })
        .or_insert(incoming);
}
