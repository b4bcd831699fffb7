//! C2: splits document text into token-bounded, overlapping chunks.
//!
//! The reference pipeline this crate is patterned after sizes chunks with a
//! `tokenizers`-crate BERT tokenizer fetched from the network at startup and
//! cached in a `OnceLock`. That mechanism is not reproducible offline and
//! token counts from a real subword tokenizer are not what matters here —
//! what matters is a deterministic, monotonic-in-length counter. This module
//! keeps the reference's delivery mechanism (`text_splitter`'s
//! `TextSplitter`/`ChunkConfig` with a pluggable sizer) but supplies its own
//! `ChunkSizer` backed by a hand-rolled counter instead of a remote model.

use common::error::AppError;
use common::ids::new_chunk_id;
use common::model::Chunk;
use text_splitter::{ChunkCapacity, ChunkConfig, ChunkSizer, TextSplitter};

/// Approximates a BPE-style token count: each whitespace-delimited word
/// contributes `ceil(chars / 4)` tokens, a common rule of thumb for
/// subword tokenizers, with a floor of one token for any non-empty word.
/// Deterministic and monotonic in length by construction.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().map(word_token_count).sum()
}

fn word_token_count(word: &str) -> usize {
    let chars = word.chars().count();
    if chars == 0 {
        0
    } else {
        chars.div_ceil(4).max(1)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BpeLikeSizer;

impl ChunkSizer for BpeLikeSizer {
    fn size(&self, chunk: &str) -> usize {
        count_tokens(chunk)
    }
}

/// Splits `content` into an ordered sequence of [`Chunk`]s.
///
/// Empty input yields an empty sequence. Consecutive chunks share exactly
/// `overlap` tokens, enforced by `text_splitter`'s own overlap mechanism.
pub fn chunk_document(
    source_doc_id: &str,
    content: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, AppError> {
    if content.is_empty() {
        return Ok(Vec::new());
    }
    if chunk_size == 0 {
        return Err(AppError::Configuration(
            "chunk_size must be greater than zero".into(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::Configuration(format!(
            "chunk_overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    let capacity = ChunkCapacity::new(chunk_size);
    let config = ChunkConfig::new(capacity)
        .with_overlap(overlap)
        .map_err(|err| AppError::Configuration(format!("invalid chunk overlap: {err}")))?
        .with_sizer(BpeLikeSizer);
    let splitter = TextSplitter::new(config);

    let chunks = splitter
        .chunks(content)
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            chunk_id: new_chunk_id(),
            source_doc_id: source_doc_id.to_string(),
            chunk_index,
            content: text.to_string(),
            token_count: count_tokens(text),
        })
        .collect();

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks = chunk_document("doc-1", "", 20, 5).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(chunk_document("doc-1", "hello world", 10, 10).is_err());
    }

    #[test]
    fn counter_is_monotonic_in_word_length() {
        assert!(count_tokens("a") <= count_tokens("aaaaaaaa"));
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn counter_grows_with_more_words() {
        assert!(count_tokens("alpha beta") >= count_tokens("alpha"));
    }

    #[test]
    fn long_document_splits_into_multiple_ordered_chunks() {
        let words: Vec<&str> = std::iter::repeat("alpha").take(400).collect();
        let document = words.join(" ");
        let chunks = chunk_document("doc-1", &document, 20, 5).unwrap();
        assert!(chunks.len() > 1);
        for (idx, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, idx);
            assert!(chunk.token_count <= 20 + 5);
        }
    }
}
