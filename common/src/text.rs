//! Name normalization shared by entity identity and similarity scoring.

/// Lowercases, strips non-alphanumeric characters (keeping whitespace as a
/// token separator) and collapses runs of whitespace to single spaces.
///
/// This is the identity function for entities within a project: two names
/// that normalize to the same string are the same entity.
#[must_use]
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        }
        // other punctuation is dropped entirely
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Strips a single layer of surrounding matching quotes (`"` or `'`) and
/// trims whitespace, used when recovering entity/relation names from raw
/// LLM output before they are passed through [`normalize`].
#[must_use]
pub fn strip_quotes_and_trim(raw: &str) -> String {
    let trimmed = raw.trim();
    let bytes = trimmed.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return trimmed[1..trimmed.len() - 1].trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Collapses internal whitespace runs to single spaces without altering case
/// or stripping punctuation, then truncates to `max_len` characters.
#[must_use]
pub fn collapse_whitespace_and_truncate(raw: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    if out.chars().count() > max_len {
        out.chars().take(max_len).collect()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_punctuation() {
        assert_eq!(normalize("MIT"), "mit");
        assert_eq!(
            normalize("Massachusetts Institute of Technology"),
            "massachusetts institute of technology"
        );
        assert_eq!(normalize("Acme, Inc."), "acme inc");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  Foo   Bar  "), "foo bar");
    }

    #[test]
    fn strip_quotes_handles_single_and_double() {
        assert_eq!(strip_quotes_and_trim("\"MIT\""), "MIT");
        assert_eq!(strip_quotes_and_trim("'MIT'"), "MIT");
        assert_eq!(strip_quotes_and_trim("  MIT  "), "MIT");
        assert_eq!(strip_quotes_and_trim("MIT"), "MIT");
    }

    #[test]
    fn collapse_whitespace_and_truncate_respects_max_len() {
        let collapsed = collapse_whitespace_and_truncate("a   b\n\nc", 100);
        assert_eq!(collapsed, "a b c");
        let truncated = collapse_whitespace_and_truncate("abcdef", 3);
        assert_eq!(truncated, "abc");
    }
}
