//! Tuple-delimiter wire protocol: the constants and prompt templates
//! `KGExtractor` fills in and the LLM is instructed to emit.
//!
//! The canonical delimiters are not configurable — they are part of the
//! wire format `KGExtractor` parses — but the prompt text that tells the
//! model about them is assembled from the per-project entity type list and
//! target language the same way the reference crate assembles its ingress
//! analysis system message.

pub const TUPLE_DELIMITER: &str = "<|>";
pub const COMPLETION_DELIMITER: &str = "<|COMPLETE|>";

pub const DEFAULT_ENTITY_TYPES: &[&str] = &[
    "PERSON",
    "ORGANIZATION",
    "LOCATION",
    "EVENT",
    "CONCEPT",
];

pub const DEFAULT_LANGUAGE: &str = "English";

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a knowledge graph extraction assistant. Read the input text and
extract entities and the relationships between them.

Entity types to look for: {entity_types}
Output language: {language}

Emit one record per line using this exact wire format:

entity{tuple_delimiter}<name>{tuple_delimiter}<type>{tuple_delimiter}<description>
relation{tuple_delimiter}<src>{tuple_delimiter}<tgt>{tuple_delimiter}<keywords>{tuple_delimiter}<description>

When you have emitted every entity and relationship you can find, end your
response with the literal sentinel:

{completion_delimiter}

Input text:
{input_text}"#;

const GLEANING_USER_PROMPT: &str = "MANY ENTITIES AND RELATIONS WERE MISSED IN THE LAST EXTRACTION. \
Using the same input text and wire format, find additional entities and relationships \
that were not already captured in the previous response. Only emit new records.";

/// Fills `{input_text}`, `{entity_types}`, `{language}` into the system
/// prompt template for the initial extraction pass.
#[must_use]
pub fn build_system_prompt(input_text: &str, entity_types: &[String], language: &str) -> String {
    let entity_types = if entity_types.is_empty() {
        DEFAULT_ENTITY_TYPES.join(", ")
    } else {
        entity_types.join(", ")
    };
    SYSTEM_PROMPT_TEMPLATE
        .replace("{entity_types}", &entity_types)
        .replace("{language}", language)
        .replace("{tuple_delimiter}", TUPLE_DELIMITER)
        .replace("{completion_delimiter}", COMPLETION_DELIMITER)
        .replace("{input_text}", input_text)
}

/// Builds the gleaning-pass prompt embedding `entity_types`, `language`,
/// the original chunk text and the previous LLM response, per §4.4.5.
#[must_use]
pub fn build_gleaning_system_prompt(
    input_text: &str,
    entity_types: &[String],
    language: &str,
    previous_response: &str,
) -> String {
    let base = build_system_prompt(input_text, entity_types, language);
    format!("{base}\n\nPrevious response:\n{previous_response}")
}

#[must_use]
pub fn gleaning_user_prompt() -> &'static str {
    GLEANING_USER_PROMPT
}
