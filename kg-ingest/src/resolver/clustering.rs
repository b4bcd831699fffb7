//! Similarity-matrix construction and threshold connected-components
//! clustering (§4.6.3-4.6.4).
//!
//! The parallel path mirrors the reference crate's reranker worker pool:
//! a bounded `Semaphore` caps in-flight comparisons and the comparisons
//! themselves run against `Arc<Mutex<_>>`-guarded shared state rather than
//! through a channel, since each unit of work is cheap CPU-bound string
//! comparison rather than a model call.

use std::sync::Arc;

use common::model::{Entity, EntitySimilarityScore};
use tokio::sync::{Mutex, Semaphore};

use super::similarity::{similarity, SimilarityWeights};

/// Upper-triangular pairwise similarity scores for a same-type batch.
/// `pairs[i]` holds `(j, score)` for every `j > i` that passed the
/// early-reject + threshold check.
pub async fn build_matrix(
    entities: &[Entity],
    weights: &SimilarityWeights,
    threshold: f64,
    parallel_enabled: bool,
    parallel_threads: usize,
) -> Vec<(usize, usize, EntitySimilarityScore)> {
    if entities.len() < 2 {
        return Vec::new();
    }

    let mut pairs = Vec::new();
    for i in 0..entities.len() {
        for j in (i + 1)..entities.len() {
            pairs.push((i, j));
        }
    }

    if !parallel_enabled || pairs.len() < 64 {
        return pairs
            .into_iter()
            .filter_map(|(i, j)| {
                let score = similarity(&entities[i], &entities[j], weights);
                (score.final_score >= threshold).then_some((i, j, score))
            })
            .collect();
    }

    let entities = Arc::new(entities.to_vec());
    let weights = *weights;
    let semaphore = Arc::new(Semaphore::new(parallel_threads.max(1)));
    let results = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::with_capacity(pairs.len());
    for (i, j) in pairs {
        let entities = Arc::clone(&entities);
        let semaphore = Arc::clone(&semaphore);
        let results = Arc::clone(&results);
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let score = similarity(&entities[i], &entities[j], &weights);
            if score.final_score >= threshold {
                results.lock().await.push((i, j, score));
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }

    let mut guard = results.lock().await;
    std::mem::take(&mut *guard)
}

/// Groups entity indices into connected components: two entities are in the
/// same cluster if there is a path of above-threshold pairs between them,
/// not just a direct edge (transitive merge, per §4.6.3).
#[must_use]
pub fn connected_components(
    entity_count: usize,
    edges: &[(usize, usize, EntitySimilarityScore)],
) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); entity_count];
    for (i, j, _) in edges {
        adjacency[*i].push(*j);
        adjacency[*j].push(*i);
    }

    let mut visited = vec![false; entity_count];
    let mut components = Vec::new();

    for start in 0..entity_count {
        if visited[start] {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        visited[start] = true;
        while let Some(node) = stack.pop() {
            component.push(node);
            for &neighbor in &adjacency[node] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::entity::DEFAULT_MAX_SOURCE_IDS;

    fn entity(name: &str) -> Entity {
        Entity::new(name, Some("ORG".into()), String::new(), None, DEFAULT_MAX_SOURCE_IDS).unwrap()
    }

    #[tokio::test]
    async fn sequential_matrix_finds_duplicate_pair() {
        let entities = vec![entity("Acme Corp"), entity("Acme Corp"), entity("Globex Inc")];
        let matrix = build_matrix(&entities, &SimilarityWeights::default(), 0.9, false, 1).await;
        assert_eq!(matrix.len(), 1);
        assert_eq!((matrix[0].0, matrix[0].1), (0, 1));
    }

    #[test]
    fn components_group_transitively_linked_entities() {
        let scores = vec![
            (0, 1, dummy_score()),
            (1, 2, dummy_score()),
        ];
        let components = connected_components(4, &scores);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], vec![0, 1, 2]);
        assert_eq!(components[1], vec![3]);
    }

    fn dummy_score() -> EntitySimilarityScore {
        EntitySimilarityScore {
            name1: String::new(),
            name2: String::new(),
            type1: String::new(),
            type2: String::new(),
            jaccard: 1.0,
            containment: 1.0,
            levenshtein: 1.0,
            abbreviation: 1.0,
            final_score: 1.0,
        }
    }
}
