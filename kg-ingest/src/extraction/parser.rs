//! Delimiter-tolerant parser for the tuple-delimiter wire format (§4.4.3).
//!
//! Real LLM output is noisy: models mangle the delimiter tokens, run two
//! records together on one line, and sometimes skip the completion
//! sentinel entirely. This module normalizes known corruptions before
//! splitting rather than trying to parse the corrupted form directly.

use crate::prompts::{COMPLETION_DELIMITER, TUPLE_DELIMITER};
use common::text::{collapse_whitespace_and_truncate, strip_quotes_and_trim};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntity {
    pub name: String,
    pub entity_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRelation {
    pub src: String,
    pub tgt: String,
    pub keywords: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub entities: Vec<ParsedEntity>,
    pub relations: Vec<ParsedRelation>,
}

/// Parses one LLM response into recovered entity/relation records.
///
/// Names (entity name, relation src/tgt) are quote-stripped, trimmed,
/// whitespace-collapsed and truncated to `name_max_len`. Malformed records
/// (too few fields after recovery) are dropped rather than failing the
/// whole parse — one bad line must not discard the rest of the response.
#[must_use]
pub fn parse_response(raw: &str, name_max_len: usize) -> ParseOutcome {
    let normalized = normalize_corruptions(raw);
    let body = match normalized.find(COMPLETION_DELIMITER) {
        Some(idx) => &normalized[..idx],
        None => normalized.as_str(),
    };

    let mut outcome = ParseOutcome::default();
    for raw_line in body.lines() {
        for recovered in recover_embedded_records(raw_line.trim()) {
            classify_line(&recovered, name_max_len, &mut outcome);
        }
    }
    outcome
}

/// Maps the enumerated corruption variants back to the canonical
/// delimiters: `<|#|>` / case variants / partial forms / escaping /
/// doubled delimiters / internal whitespace inside a delimiter token.
fn normalize_corruptions(raw: &str) -> String {
    let mut s = collapse_whitespace_in_delimiter_tokens(raw);

    // Dangling partial forms missing one side of the bracket, e.g. a
    // response truncated mid-delimiter.
    s = s.replace("<|#", TUPLE_DELIMITER);
    s = s.replace("#|>", TUPLE_DELIMITER);

    // Escaped delimiters: a stray backslash immediately touching an
    // already-canonical delimiter.
    s = s.replace(&format!("\\{TUPLE_DELIMITER}"), TUPLE_DELIMITER);
    s = s.replace(&format!("{TUPLE_DELIMITER}\\"), TUPLE_DELIMITER);
    s = s.replace(&format!("\\{COMPLETION_DELIMITER}"), COMPLETION_DELIMITER);
    s = s.replace(&format!("{COMPLETION_DELIMITER}\\"), COMPLETION_DELIMITER);

    // Doubled delimiters collapse to one, to a fixpoint.
    let doubled_tuple = TUPLE_DELIMITER.repeat(2);
    while s.contains(&doubled_tuple) {
        s = s.replace(&doubled_tuple, TUPLE_DELIMITER);
    }
    let doubled_completion = COMPLETION_DELIMITER.repeat(2);
    while s.contains(&doubled_completion) {
        s = s.replace(&doubled_completion, COMPLETION_DELIMITER);
    }

    s
}

/// Scans for `<...>` spans whose content, once internal whitespace is
/// stripped, is a known delimiter spelling (`|`, `|#|`, or `|complete|`
/// in any case) and rewrites the whole span to the canonical token. Bounds
/// the lookahead window so entity names that happen to contain `<` are not
/// mistaken for a delimiter.
fn collapse_whitespace_in_delimiter_tokens(s: &str) -> String {
    const WINDOW: usize = 24;
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '<' {
            let window_end = (i + 1 + WINDOW).min(chars.len());
            if let Some(rel_close) = chars[i + 1..window_end].iter().position(|&c| c == '>') {
                let close = i + 1 + rel_close;
                let inner: String = chars[i + 1..close].iter().collect();
                let stripped: String = inner.chars().filter(|c| !c.is_whitespace()).collect();
                let stripped_lower = stripped.to_lowercase();
                if stripped == "|" || stripped == "|#|" {
                    out.push_str(TUPLE_DELIMITER);
                    i = close + 1;
                    continue;
                } else if stripped_lower == "|complete|" {
                    out.push_str(COMPLETION_DELIMITER);
                    i = close + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Recovers records embedded inside a single line by repeatedly splitting
/// at an internal `{tuple_delimiter}entity{tuple_delimiter}` or
/// `{tuple_delimiter}relation{tuple_delimiter}` marker, restoring the
/// dropped prefix on the new segment.
fn recover_embedded_records(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = line.to_string();

    loop {
        let entity_marker = format!("{TUPLE_DELIMITER}entity{TUPLE_DELIMITER}");
        let relation_marker = format!("{TUPLE_DELIMITER}relation{TUPLE_DELIMITER}");
        let lower = remaining.to_lowercase();

        let entity_pos = lower.find(&entity_marker.to_lowercase()).filter(|&p| p > 0);
        let relation_pos = lower.find(&relation_marker.to_lowercase()).filter(|&p| p > 0);

        // Whichever marker occurs earliest in the line wins.
        let found = match (entity_pos, relation_pos) {
            (Some(e), Some(r)) if e <= r => Some(("entity", e, entity_marker.len())),
            (Some(_), Some(r)) => Some(("relation", r, relation_marker.len())),
            (Some(e), None) => Some(("entity", e, entity_marker.len())),
            (None, Some(r)) => Some(("relation", r, relation_marker.len())),
            (None, None) => None,
        };

        let Some((kind, pos, marker_len)) = found else {
            result.push(remaining);
            break;
        };

        result.push(remaining[..pos].to_string());
        remaining = format!("{kind}{TUPLE_DELIMITER}{}", &remaining[pos + marker_len..]);
    }

    result
}

fn classify_line(line: &str, name_max_len: usize, outcome: &mut ParseOutcome) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let mut head_split = line.splitn(2, TUPLE_DELIMITER);
    let Some(prefix) = head_split.next() else {
        return;
    };
    let rest = head_split.next();

    if prefix.trim().eq_ignore_ascii_case("entity") {
        let Some(rest) = rest else { return };
        let fields: Vec<&str> = rest.splitn(3, TUPLE_DELIMITER).collect();
        if fields.len() < 3 {
            return;
        }
        let name = clean_name(fields[0], name_max_len);
        let entity_type = fields[1].trim().to_string();
        let description = fields[2].trim().to_string();
        outcome.entities.push(ParsedEntity {
            name,
            entity_type,
            description,
        });
    } else if prefix.trim().eq_ignore_ascii_case("relation") {
        let Some(rest) = rest else { return };
        let fields: Vec<&str> = rest.splitn(4, TUPLE_DELIMITER).collect();
        if fields.len() < 4 {
            return;
        }
        let src = clean_name(fields[0], name_max_len);
        let tgt = clean_name(fields[1], name_max_len);
        let keywords = fields[2].trim().to_string();
        let description = fields[3].trim().to_string();
        outcome.relations.push(ParsedRelation {
            src,
            tgt,
            keywords,
            description,
        });
    }
}

fn clean_name(raw: &str, max_len: usize) -> String {
    let unquoted = strip_quotes_and_trim(raw);
    collapse_whitespace_and_truncate(&unquoted, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_response() {
        let response = format!(
            "entity{TUPLE_DELIMITER}Acme Corp{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}a company\n\
             relation{TUPLE_DELIMITER}Acme Corp{TUPLE_DELIMITER}Globex{TUPLE_DELIMITER}owns{TUPLE_DELIMITER}acquired in 2020\n\
             {COMPLETION_DELIMITER}"
        );
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "Acme Corp");
        assert_eq!(outcome.relations.len(), 1);
        assert_eq!(outcome.relations[0].src, "Acme Corp");
        assert_eq!(outcome.relations[0].tgt, "Globex");
    }

    #[test]
    fn recovers_legacy_tuple_delimiter_and_completion_spelling() {
        let response = r#"entity<|#|>"MIT"<|#|>ORG<|#|>school<|COMPLETE|>"#;
        let outcome = parse_response(response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "MIT");
        assert_eq!(outcome.entities[0].entity_type, "ORG");
        assert_eq!(outcome.entities[0].description, "school");
    }

    #[test]
    fn recovers_lowercase_completion_sentinel() {
        let response = format!(
            "entity{TUPLE_DELIMITER}MIT{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}school<|complete|>"
        );
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
    }

    #[test]
    fn recovers_doubled_delimiters() {
        let td2 = TUPLE_DELIMITER.repeat(2);
        let response = format!("entity{td2}MIT{td2}ORG{td2}school{COMPLETION_DELIMITER}");
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "MIT");
    }

    #[test]
    fn recovers_whitespace_inside_delimiter_token() {
        let response = "entity< | >MIT< | >ORG< | >school<| complete |>".to_string();
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "MIT");
    }

    #[test]
    fn recovers_escaped_delimiter() {
        let response = format!(
            "entity{TUPLE_DELIMITER}MIT{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}school\\{COMPLETION_DELIMITER}"
        );
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
    }

    #[test]
    fn recovers_partial_delimiter_forms() {
        let response = "entity<|#MIT<|#ORG<|#school".to_string();
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "MIT");
    }

    #[test]
    fn recovers_embedded_record_on_same_line() {
        let response = format!(
            "entity{TUPLE_DELIMITER}A{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}first{TUPLE_DELIMITER}entity{TUPLE_DELIMITER}B{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}second{COMPLETION_DELIMITER}"
        );
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.entities[0].name, "A");
        assert_eq!(outcome.entities[1].name, "B");
    }

    #[test]
    fn rejects_records_with_too_few_fields() {
        let response = format!("entity{TUPLE_DELIMITER}OnlyName{COMPLETION_DELIMITER}");
        let outcome = parse_response(&response, 500);
        assert!(outcome.entities.is_empty());
    }

    #[test]
    fn stops_at_completion_sentinel() {
        let response = format!(
            "entity{TUPLE_DELIMITER}A{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}first{COMPLETION_DELIMITER}\nentity{TUPLE_DELIMITER}B{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}should be ignored"
        );
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].name, "A");
    }

    #[test]
    fn mixed_case_prefix_is_classified() {
        let response = format!("Entity{TUPLE_DELIMITER}A{TUPLE_DELIMITER}ORG{TUPLE_DELIMITER}d\nRELATION{TUPLE_DELIMITER}A{TUPLE_DELIMITER}B{TUPLE_DELIMITER}kw{TUPLE_DELIMITER}d");
        let outcome = parse_response(&response, 500);
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.relations.len(), 1);
    }
}
