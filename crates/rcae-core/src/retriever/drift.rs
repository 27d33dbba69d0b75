//! Drift search: iterated local search, widening the query from the prior
//! round's top entities until the hypothesis stops changing (§4.6 drift
//! search).

use super::local::{local_search, LocalSearchOptions, LocalSearchResult};
use crate::capability::{cosine_similarity, Embedder, VectorBackend};
use crate::model::{Entity, Relationship};
use crate::storage::{Storage, StorageError};
use std::collections::HashMap;

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_CONVERGENCE_THRESHOLD: f32 = 0.9;

#[derive(Debug, Clone, Default)]
pub struct DriftSearchResult {
    pub iterations: Vec<LocalSearchResult>,
    pub converged: bool,
}

impl DriftSearchResult {
    /// Merges entities and relationships across every iteration, keeping
    /// each entity's highest score seen in any round (§4.6 drift search
    /// merge step), rather than discarding everything but the last round.
    pub fn final_result(&self) -> LocalSearchResult {
        let mut entities: HashMap<String, Entity> = HashMap::new();
        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut relationships: HashMap<String, Relationship> = HashMap::new();
        let mut seed_entity_ids: Vec<String> = Vec::new();

        for iteration in &self.iterations {
            for entity in &iteration.entities {
                let score = iteration.scores.get(&entity.id).copied().unwrap_or(0.0);
                scores
                    .entry(entity.id.clone())
                    .and_modify(|existing| {
                        if score > *existing {
                            *existing = score;
                        }
                    })
                    .or_insert(score);
                entities.entry(entity.id.clone()).or_insert_with(|| entity.clone());
            }
            for relationship in &iteration.relationships {
                relationships
                    .entry(relationship.id.clone())
                    .or_insert_with(|| relationship.clone());
            }
            for seed in &iteration.seed_entity_ids {
                if !seed_entity_ids.contains(seed) {
                    seed_entity_ids.push(seed.clone());
                }
            }
        }

        let mut merged_entities: Vec<Entity> = entities.into_values().collect();
        merged_entities.sort_by(|a, b| {
            scores
                .get(&b.id)
                .copied()
                .unwrap_or(0.0)
                .partial_cmp(&scores.get(&a.id).copied().unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        LocalSearchResult {
            entities: merged_entities,
            relationships: relationships.into_values().collect(),
            seed_entity_ids,
            scores,
        }
    }
}

/// Renders an iteration's top entities into the short text the next round's
/// hypothesis embedding is built from.
fn hypothesis_text(result: &LocalSearchResult) -> String {
    result
        .entities
        .iter()
        .take(5)
        .map(|e| format!("{}: {}", e.canonical_name, e.description))
        .collect::<Vec<_>>()
        .join(". ")
}

/// Runs local search repeatedly, re-querying with the names of the prior
/// round's top entities appended to the original query, stopping early once
/// consecutive rounds' hypothesis embeddings converge (cosine similarity >=
/// `convergence_threshold`) or `max_iterations` is reached.
pub fn drift_search(
    storage: &Storage,
    embedder: &dyn Embedder,
    vectors: &dyn VectorBackend,
    query: &str,
    options: LocalSearchOptions,
    max_iterations: u32,
    convergence_threshold: f32,
) -> Result<DriftSearchResult, StorageError> {
    let mut iterations = Vec::new();
    let mut current_query = query.to_string();
    let mut converged = false;
    let mut previous_hypothesis_embedding: Option<Vec<f32>> = None;

    for _ in 0..max_iterations.max(1) {
        let result = local_search(storage, embedder, vectors, &current_query, options)?;

        let hypothesis_embedding = embedder.embed(&hypothesis_text(&result));
        let stop = if result.entities.is_empty() {
            true
        } else {
            match (&previous_hypothesis_embedding, &hypothesis_embedding) {
                (Some(previous), Some(current)) => {
                    cosine_similarity(previous, current) >= convergence_threshold
                }
                _ => false,
            }
        };

        let expansion: Vec<String> = result
            .entities
            .iter()
            .take(3)
            .map(|e| e.canonical_name.clone())
            .collect();
        previous_hypothesis_embedding = hypothesis_embedding;
        iterations.push(result);
        if stop {
            converged = true;
            break;
        }
        if expansion.is_empty() {
            break;
        }
        current_query = format!("{query} {}", expansion.join(" "));
    }

    Ok(DriftSearchResult {
        iterations,
        converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{SearchFilter, VectorMatch};
    use crate::model::VectorPayload;

    struct NullEmbedder;
    impl Embedder for NullEmbedder {
        fn embed(&self, _text: &str) -> Option<Vec<f32>> {
            None
        }
    }

    struct NullVectors;
    impl VectorBackend for NullVectors {
        fn upsert(&self, _key: &str, _vector: &[f32], _payload: VectorPayload) -> bool {
            true
        }
        fn search(&self, _query: &[f32], _limit: usize, _filter: &SearchFilter) -> Vec<VectorMatch> {
            Vec::new()
        }
        fn remove_by_memory_id(&self, _memory_id: &str) -> usize {
            0
        }
        fn remove_key(&self, _key: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_drift_search_stops_immediately_on_empty_graph() {
        let storage = Storage::open_in_memory().unwrap();
        let result = drift_search(
            &storage,
            &NullEmbedder,
            &NullVectors,
            "query",
            LocalSearchOptions::default(),
            DEFAULT_MAX_ITERATIONS,
            DEFAULT_CONVERGENCE_THRESHOLD,
        )
        .unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations.len(), 1);
    }
}
