//! `EntitySimilarityCalculator` (§4.6.2): pairwise multi-metric similarity
//! between two same-type entities.

use common::model::{Entity, EntitySimilarityScore};
use common::text::normalize;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "and", "or", "for", "in", "on", "at", "to", "from",
];

#[derive(Debug, Clone, Copy)]
pub struct SimilarityWeights {
    pub jaccard: f64,
    pub containment: f64,
    pub edit: f64,
    pub abbreviation: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            jaccard: 0.35,
            containment: 0.25,
            edit: 0.30,
            abbreviation: 0.10,
        }
    }
}

impl SimilarityWeights {
    /// Validated at config load: weights must sum to 1.0 within tolerance.
    #[must_use]
    pub fn sums_to_one(&self) -> bool {
        let total = self.jaccard + self.containment + self.edit + self.abbreviation;
        (total - 1.0).abs() <= 0.01
    }
}

/// Computes the full similarity score for a same-type pair, applying the
/// early-reject heuristics first so obviously-unrelated pairs skip the more
/// expensive metrics.
#[must_use]
pub fn similarity(a: &Entity, b: &Entity, weights: &SimilarityWeights) -> EntitySimilarityScore {
    let type1 = a.resolved_type().to_string();
    let type2 = b.resolved_type().to_string();

    if type1 != type2 || should_early_reject(&a.name, &b.name) {
        return zero_score(a, b, type1, type2);
    }

    let norm_a = normalize(&a.name);
    let norm_b = normalize(&b.name);

    let jaccard = jaccard_similarity(&norm_a, &norm_b);
    let containment = containment_similarity(&norm_a, &norm_b);
    let levenshtein = levenshtein_similarity(&norm_a, &norm_b);
    let abbreviation = abbreviation_similarity(&norm_a, &norm_b);

    let final_score = weights.jaccard * jaccard
        + weights.containment * containment
        + weights.edit * levenshtein
        + weights.abbreviation * abbreviation;

    EntitySimilarityScore {
        name1: a.name.clone(),
        name2: b.name.clone(),
        type1,
        type2,
        jaccard,
        containment,
        levenshtein,
        abbreviation,
        final_score,
    }
}

fn zero_score(a: &Entity, b: &Entity, type1: String, type2: String) -> EntitySimilarityScore {
    EntitySimilarityScore {
        name1: a.name.clone(),
        name2: b.name.clone(),
        type1,
        type2,
        jaccard: 0.0,
        containment: 0.0,
        levenshtein: 0.0,
        abbreviation: 0.0,
        final_score: 0.0,
    }
}

/// Early-reject heuristics (§4.6.2), evaluated on raw (pre-normalization)
/// names for the length/prefix checks, matching the spec's description of
/// them as cheap guards ahead of the real metrics.
fn should_early_reject(name_a: &str, name_b: &str) -> bool {
    let len_a = name_a.chars().count();
    let len_b = name_b.chars().count();

    if len_a > 10 && len_b > 10 {
        let (longer, shorter) = if len_a > len_b { (len_a, len_b) } else { (len_b, len_a) };
        if shorter > 0 && (longer as f64) / (shorter as f64) > 5.0 {
            return true;
        }
    }

    let is_short = |name: &str, len: usize| len <= 10 && !name.contains(' ');
    let a_short = is_short(name_a, len_a);
    let b_short = is_short(name_b, len_b);

    if !a_short && !b_short {
        let first_a = name_a.split_whitespace().next().unwrap_or("").to_lowercase();
        let first_b = name_b.split_whitespace().next().unwrap_or("").to_lowercase();
        let shares_prefix = shares_n_char_prefix(&first_a, &first_b, 2);
        let overlap = char_overlap_ratio(&first_a, &first_b);
        if !shares_prefix && overlap <= 0.5 {
            return true;
        }
    }

    false
}

fn shares_n_char_prefix(a: &str, b: &str, n: usize) -> bool {
    let prefix_a: String = a.chars().take(n).collect();
    let prefix_b: String = b.chars().take(n).collect();
    !prefix_a.is_empty() && prefix_a.len() == n.min(a.chars().count()).max(0) && prefix_a == prefix_b
}

fn char_overlap_ratio(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;
    let set_a: HashSet<char> = a.chars().collect();
    let set_b: HashSet<char> = b.chars().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let smaller = set_a.len().min(set_b.len());
    intersection as f64 / smaller as f64
}

fn jaccard_similarity(norm_a: &str, norm_b: &str) -> f64 {
    use std::collections::HashSet;
    let tokens_a: HashSet<&str> = norm_a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = norm_b.split_whitespace().collect();
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn containment_similarity(norm_a: &str, norm_b: &str) -> f64 {
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }
    if norm_a.contains(norm_b) || norm_b.contains(norm_a) {
        1.0
    } else {
        0.0
    }
}

fn levenshtein_similarity(norm_a: &str, norm_b: &str) -> f64 {
    if norm_a == norm_b {
        return 1.0;
    }
    let distance = strsim::levenshtein(norm_a, norm_b);
    let max_len = norm_a.chars().count().max(norm_b.chars().count());
    if max_len == 0 {
        1.0
    } else {
        1.0 - (distance as f64 / max_len as f64)
    }
}

/// 1 iff the shorter name equals the concatenation of first letters of the
/// longer name's non-stop-word tokens, or the names are identical.
fn abbreviation_similarity(norm_a: &str, norm_b: &str) -> f64 {
    if norm_a == norm_b {
        return 1.0;
    }
    let (shorter, longer) = if norm_a.len() <= norm_b.len() {
        (norm_a, norm_b)
    } else {
        (norm_b, norm_a)
    };
    let initials: String = longer
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .filter_map(|word| word.chars().next())
        .collect();
    if !initials.is_empty() && initials == shorter {
        1.0
    } else {
        0.0
    }
}
