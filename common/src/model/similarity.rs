use serde::{Deserialize, Serialize};

/// The per-pair output of the entity similarity calculator. Each component
/// score and the weighted `final_score` live in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySimilarityScore {
    pub name1: String,
    pub name2: String,
    pub type1: String,
    pub type2: String,
    pub jaccard: f64,
    pub containment: f64,
    pub levenshtein: f64,
    pub abbreviation: f64,
    pub final_score: f64,
}
