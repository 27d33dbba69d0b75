//! Capability traits for optional external backends (§9)
//!
//! `graphrag`, `retriever`, and `assembler` are compiled unconditionally, but
//! the embedding model and vector backend are feature-gated. Rather than
//! reach into `embeddings`/`search` directly, those modules depend on these
//! traits instead, injected by whoever constructs them. `VectorIndex` and
//! `EmbeddingService` implement them when their features are enabled.

use crate::model::VectorPayload;
use std::collections::HashMap;

/// Produces embedding vectors for arbitrary text. Batch calls should fall
/// back to per-item embedding on partial failure rather than failing the
/// whole batch.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Option<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// A single vector hit returned by a [`VectorBackend`] search.
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub key: String,
    pub score: f32,
    pub payload: Option<VectorPayload>,
}

/// Conjunction of metadata filters over a vector search (§4.4).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub type_tag: Option<&'static str>,
    pub min_importance: Option<f64>,
}

/// The subset of vector-store operations `graphrag`/`retriever`/`assembler`
/// need, independent of the concrete ANN backend in use.
pub trait VectorBackend: Send + Sync {
    fn upsert(&self, key: &str, vector: &[f32], payload: VectorPayload) -> bool;
    fn search(&self, query: &[f32], limit: usize, filter: &SearchFilter) -> Vec<VectorMatch>;
    /// Removes every vector belonging to `memory_id` (a memory's own vector
    /// plus any chunk vectors keyed off it).
    fn remove_by_memory_id(&self, memory_id: &str) -> usize;
    /// Removes a single vector by its exact key, for garbage-collecting
    /// entity/report vectors whose owner row was deleted.
    fn remove_key(&self, key: &str) -> bool;
}

/// An extracted entity mention, prior to alias resolution (§4.5 step 2).
#[derive(Debug, Clone)]
pub struct ExtractedEntity {
    pub canonical_name: String,
    pub entity_type: String,
    pub description: String,
    pub confidence: f32,
    pub mention_text: String,
}

/// An extracted relationship between two entity mentions, referenced by
/// `canonical_name` until alias resolution assigns entity ids.
#[derive(Debug, Clone)]
pub struct ExtractedRelationship {
    pub source_name: String,
    pub target_name: String,
    pub relationship_type: String,
    pub description: String,
    pub strength: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub entities: Vec<ExtractedEntity>,
    pub relationships: Vec<ExtractedRelationship>,
}

/// An external LLM-backed entity/relationship extractor (§4.5 step 2). Absent
/// by default; [`heuristic_extract`] is the fallback path exercised in
/// practice.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, content: &str) -> Option<ExtractionResult>;
}

/// Regex/heuristic entity extraction: capitalized phrases and
/// quote-delimited identifiers as entities, co-occurrence as relationships.
pub fn heuristic_extract(content: &str) -> ExtractionResult {
    let mut seen: HashMap<String, ExtractedEntity> = HashMap::new();

    for phrase in capitalized_phrases(content) {
        seen.entry(phrase.clone()).or_insert(ExtractedEntity {
            canonical_name: phrase.clone(),
            entity_type: "CONCEPT".to_string(),
            description: format!("Mentioned as \"{phrase}\""),
            confidence: 0.4,
            mention_text: phrase,
        });
    }
    for quoted in quoted_identifiers(content) {
        seen.entry(quoted.clone()).or_insert(ExtractedEntity {
            canonical_name: quoted.clone(),
            entity_type: "IDENTIFIER".to_string(),
            description: format!("Quoted identifier \"{quoted}\""),
            confidence: 0.5,
            mention_text: quoted,
        });
    }

    let names: Vec<String> = seen.keys().cloned().collect();
    let mut relationships = Vec::new();
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            relationships.push(ExtractedRelationship {
                source_name: names[i].clone(),
                target_name: names[j].clone(),
                relationship_type: "CO_OCCURS_WITH".to_string(),
                description: "Co-occur in the same memory".to_string(),
                strength: 3.0,
            });
        }
    }

    ExtractionResult {
        entities: seen.into_values().collect(),
        relationships,
    }
}

/// Fuses an arbitrary number of ranked candidate lists with per-source
/// weights (§4.6 "Fusion at the context layer"). Each source contributes
/// `weight / (k + rank)` per candidate; duplicates across sources collapse
/// to the sum of their contributions, so an item ranked well by multiple
/// sources outranks one that only one source liked. Lives here rather than
/// in `search` so the always-compiled retriever can use it without the
/// `vector-search` feature.
pub fn reciprocal_rank_fusion_weighted(
    sources: &[(&[(String, f32)], f32)],
    k: f32,
) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    for (results, weight) in sources {
        for (rank, (key, _)) in results.iter().enumerate() {
            *scores.entry(key.clone()).or_default() += weight / (k + rank as f32);
        }
    }
    let mut results: Vec<(String, f32)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    results
}

/// Cosine similarity between two equal-length embedding vectors, `0.0` if
/// either is empty or their lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn capitalized_phrases(content: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for word in content.split_whitespace() {
        let clean = word.trim_matches(|c: char| !c.is_alphanumeric());
        let starts_upper = clean.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
        if starts_upper && clean.len() > 1 {
            current.push(clean);
        } else {
            if current.len() >= 1 && current.iter().any(|w| w.len() > 2) {
                phrases.push(current.join(" "));
            }
            current.clear();
        }
    }
    if current.len() >= 1 && current.iter().any(|w| w.len() > 2) {
        phrases.push(current.join(" "));
    }
    phrases.sort();
    phrases.dedup();
    phrases
}

fn quoted_identifiers(content: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut chars = content.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c == '`' {
            if let Some(end) = content[start + 1..].find('`') {
                let ident = &content[start + 1..start + 1 + end];
                if !ident.is_empty() && ident.len() < 64 {
                    result.push(ident.to_string());
                }
            }
        }
    }
    result.sort();
    result.dedup();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_extract_finds_capitalized_phrase() {
        let result = heuristic_extract("We chose PostgreSQL for the Storage Layer.");
        assert!(result.entities.iter().any(|e| e.canonical_name == "PostgreSQL"));
        assert!(result.entities.iter().any(|e| e.canonical_name.contains("Storage Layer")));
    }

    #[test]
    fn test_heuristic_extract_finds_quoted_identifier() {
        let result = heuristic_extract("The bug was in `parse_config` during startup.");
        assert!(result.entities.iter().any(|e| e.canonical_name == "parse_config"));
    }

    #[test]
    fn test_heuristic_extract_relates_cooccurring_entities() {
        let result = heuristic_extract("PostgreSQL and `RedisCache` work together.");
        assert!(!result.relationships.is_empty());
    }

    #[test]
    fn test_cosine_similarity_identical_vectors_is_one() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_vectors_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_reciprocal_rank_fusion_weighted_prefers_multi_source_hits() {
        let code: Vec<(String, f32)> = vec![("a".into(), 1.0), ("b".into(), 0.9)];
        let entity: Vec<(String, f32)> = vec![("b".into(), 1.0), ("c".into(), 0.9)];
        let results = reciprocal_rank_fusion_weighted(&[(&code, 1.0), (&entity, 1.0)], 60.0);
        assert_eq!(results[0].0, "b");
    }
}
