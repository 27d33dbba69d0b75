//! Local search: seed entities, then BFS outward over the relationship
//! graph with strength/depth decay (§4.6 local search).

use super::lexical::lexical_overlap;
use crate::capability::{Embedder, SearchFilter, VectorBackend};
use crate::model::{Entity, Relationship};
use crate::storage::{Storage, StorageError};
use std::collections::{HashMap, HashSet, VecDeque};

pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const DEFAULT_MIN_EDGE_WEIGHT: f32 = 3.0;
pub const DEFAULT_SEED_COUNT: usize = 5;
const VECTOR_SEED_WEIGHT: f32 = 0.72;
const LEXICAL_SEED_WEIGHT: f32 = 0.28;

#[derive(Debug, Clone)]
pub struct LocalSearchResult {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    /// Entity ids used as BFS seeds, ranked by blended seed score.
    pub seed_entity_ids: Vec<String>,
    /// Entity id -> retrieval score, decayed by BFS depth.
    pub scores: HashMap<String, f32>,
}

impl Default for LocalSearchResult {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            relationships: Vec::new(),
            seed_entity_ids: Vec::new(),
            scores: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LocalSearchOptions {
    pub max_depth: u32,
    pub min_edge_weight: f32,
    pub seed_count: usize,
}

impl Default for LocalSearchOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_edge_weight: DEFAULT_MIN_EDGE_WEIGHT,
            seed_count: DEFAULT_SEED_COUNT,
        }
    }
}

/// Blends vector similarity over `graphrag_entity` embeddings with lexical
/// token overlap against every persisted entity's name/description, picks
/// the top `seed_count` as BFS seeds, then expands outward along
/// relationships above `min_edge_weight`, decaying each hop's contribution
/// by `strength/10 * 0.8^depth`.
pub fn local_search(
    storage: &Storage,
    embedder: &dyn Embedder,
    vectors: &dyn VectorBackend,
    query: &str,
    options: LocalSearchOptions,
) -> Result<LocalSearchResult, StorageError> {
    let all_entities = storage.all_entities()?;
    if all_entities.is_empty() {
        return Ok(LocalSearchResult::default());
    }

    let vector_hits: HashMap<String, f32> = match embedder.embed(query) {
        Some(query_vector) => vectors
            .search(
                &query_vector,
                options.seed_count * 4,
                &SearchFilter {
                    type_tag: Some("graphrag_entity"),
                    min_importance: None,
                },
            )
            .into_iter()
            .filter_map(|hit| {
                hit.payload.as_ref().and_then(|payload| match payload {
                    crate::model::VectorPayload::GraphragEntity { entity_id, .. } => {
                        Some((entity_id.clone(), hit.score))
                    }
                    _ => None,
                })
            })
            .collect(),
        None => HashMap::new(),
    };

    let mut blended: Vec<(String, f32)> = all_entities
        .iter()
        .map(|entity| {
            let vector_score = vector_hits.get(&entity.id).copied().unwrap_or(0.0);
            let lexical_score = lexical_overlap(
                query,
                &format!("{} {}", entity.canonical_name, entity.description),
            );
            let blended = VECTOR_SEED_WEIGHT * vector_score + LEXICAL_SEED_WEIGHT * lexical_score;
            (entity.id.clone(), blended)
        })
        .filter(|(_, score)| *score > 0.0)
        .collect();
    blended.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    blended.truncate(options.seed_count);

    if blended.is_empty() {
        return Ok(LocalSearchResult::default());
    }

    let seed_entity_ids: Vec<String> = blended.iter().map(|(id, _)| id.clone()).collect();
    let mut scores: HashMap<String, f32> = blended.into_iter().collect();
    let mut relationships: Vec<Relationship> = Vec::new();
    let mut seen_relationships = HashSet::new();
    let mut visited: HashSet<String> = seed_entity_ids.iter().cloned().collect();
    let mut frontier: VecDeque<(String, u32, f32)> = seed_entity_ids
        .iter()
        .map(|id| (id.clone(), 0u32, scores[id]))
        .collect();

    while let Some((entity_id, depth, base_score)) = frontier.pop_front() {
        if depth >= options.max_depth {
            continue;
        }
        for relationship in storage.relationships_for_entity(&entity_id, options.min_edge_weight)? {
            if seen_relationships.insert(relationship.id.clone()) {
                relationships.push(relationship.clone());
            }
            let neighbor = if relationship.source_entity_id == entity_id {
                relationship.target_entity_id.clone()
            } else {
                relationship.source_entity_id.clone()
            };
            let decay = (relationship.strength / 10.0) * 0.8_f32.powi(depth as i32 + 1);
            let contribution = base_score * decay;
            let entry = scores.entry(neighbor.clone()).or_insert(0.0);
            *entry += contribution;
            if visited.insert(neighbor.clone()) {
                frontier.push_back((neighbor, depth + 1, contribution));
            }
        }
    }

    let mut entities: Vec<Entity> = Vec::new();
    for id in scores.keys() {
        if let Ok(entity) = storage.get_entity(id) {
            entities.push(entity);
        }
    }
    entities.sort_by(|a, b| {
        scores[&b.id]
            .partial_cmp(&scores[&a.id])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(LocalSearchResult {
        entities,
        relationships,
        seed_entity_ids,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::VectorMatch;
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
    fn test_local_search_empty_graph_returns_default() {
        let storage = Storage::open_in_memory().unwrap();
        let result = local_search(
            &storage,
            &NullEmbedder,
            &NullVectors,
            "anything",
            LocalSearchOptions::default(),
        )
        .unwrap();
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_local_search_expands_to_neighbor_via_lexical_seed() {
        let storage = Storage::open_in_memory().unwrap();
        let a = storage
            .create_entity("postgres db", "Postgres DB", "SERVICE", "the database", 0.8)
            .unwrap();
        let b = storage
            .create_entity("order service", "Order Service", "SERVICE", "uses the database", 0.8)
            .unwrap();
        storage
            .upsert_relationship(&a.id, &b.id, "USES", "d", 8.0, "mem1")
            .unwrap();

        let result = local_search(
            &storage,
            &NullEmbedder,
            &NullVectors,
            "Postgres DB",
            LocalSearchOptions::default(),
        )
        .unwrap();

        assert!(result.seed_entity_ids.contains(&a.id));
        assert!(result.entities.iter().any(|e| e.id == b.id));
    }
}
