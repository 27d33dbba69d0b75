//! Memory-to-memory relation suggestion (§4.8)
//!
//! Scores every pair of memories on shared files, tag overlap, temporal
//! proximity, and embedding similarity, maps high-confidence type pairs to a
//! relation type via a small rule table, and separately flags
//! title-similar same-type pairs as `supersedes`.

use crate::capability::{cosine_similarity, Embedder};
use crate::model::{Memory, MemoryRelation, RelationDetectionMethod};
use crate::storage::{Storage, StorageError};
use std::collections::HashSet;
use std::sync::Arc;

/// Minimum blended confidence before a relation is persisted.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Jaccard title-token overlap required for a `supersedes` suggestion.
pub const SUPERSEDES_TITLE_OVERLAP: f32 = 0.7;
/// Memories created within this many hours of each other get a temporal
/// proximity boost.
const TEMPORAL_WINDOW_HOURS: i64 = 24;

/// `(source_type, target_type) -> relation_type` for pairs with a
/// conventionally asymmetric relationship. Unlisted pairs fall back to
/// `related_to`.
const TYPE_RELATION_RULES: &[((&str, &str), &str)] = &[
    (("decision", "solution"), "causes"),
    (("bug", "solution"), "causes"),
    (("solution", "decision"), "supports"),
    (("pattern", "decision"), "supports"),
    (("decision", "pattern"), "implements"),
];

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn relation_type_for(source: &Memory, target: &Memory) -> &'static str {
    TYPE_RELATION_RULES
        .iter()
        .find(|((from, to), _)| *from == source.memory_type && *to == target.memory_type)
        .map(|(_, relation)| *relation)
        .unwrap_or("related_to")
}

/// Suggests and persists relations between memories (§4.8).
pub struct MemoryRelationDetector {
    storage: Arc<Storage>,
    embedder: Option<Arc<dyn Embedder>>,
    confidence_threshold: f32,
}

impl MemoryRelationDetector {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            embedder: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn all_memories(&self) -> Result<Vec<Memory>, StorageError> {
        const PAGE: u32 = 500;
        let mut memories = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self.storage.list_memories(PAGE, offset)?;
            let page_len = page.len() as u32;
            memories.extend(page);
            if page_len < PAGE {
                break;
            }
            offset += PAGE;
        }
        Ok(memories)
    }

    /// Scores and persists relations across every pair of currently
    /// persisted memories, returning the ones that cleared the confidence
    /// threshold.
    pub fn detect_all(&self) -> Result<Vec<MemoryRelation>, StorageError> {
        let memories = self.all_memories()?;
        let embeddings: Vec<Option<Vec<f32>>> = memories
            .iter()
            .map(|m| {
                self.embedder
                    .as_ref()
                    .and_then(|e| e.embed(&format!("{} {}", m.title, m.content)))
            })
            .collect();

        let mut created = Vec::new();
        for i in 0..memories.len() {
            for j in (i + 1)..memories.len() {
                if let Some(relation) = self.score_pair(&memories[i], &memories[j], &embeddings[i], &embeddings[j])? {
                    created.push(relation);
                }
                if let Some(relation) = self.supersedes_pair(&memories[i], &memories[j])? {
                    created.push(relation);
                }
            }
        }
        Ok(created)
    }

    fn score_pair(
        &self,
        a: &Memory,
        b: &Memory,
        embedding_a: &Option<Vec<f32>>,
        embedding_b: &Option<Vec<f32>>,
    ) -> Result<Option<MemoryRelation>, StorageError> {
        let shared_files = jaccard(
            &a.related_files.iter().cloned().collect(),
            &b.related_files.iter().cloned().collect(),
        );
        let tag_overlap = jaccard(
            &a.tags.iter().cloned().collect(),
            &b.tags.iter().cloned().collect(),
        );
        let hours_apart = (a.created_at - b.created_at).num_hours().abs();
        let temporal = if hours_apart <= TEMPORAL_WINDOW_HOURS {
            1.0 - (hours_apart as f32 / TEMPORAL_WINDOW_HOURS as f32)
        } else {
            0.0
        };
        let embedding_similarity = match (embedding_a, embedding_b) {
            (Some(x), Some(y)) => cosine_similarity(x, y).max(0.0),
            _ => 0.0,
        };

        let (confidence, method) = [
            (shared_files, RelationDetectionMethod::SharedFiles),
            (tag_overlap, RelationDetectionMethod::TagOverlap),
            (temporal, RelationDetectionMethod::TemporalProximity),
            (embedding_similarity, RelationDetectionMethod::EmbeddingSimilarity),
        ]
        .into_iter()
        .max_by(|x, y| x.0.partial_cmp(&y.0).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap();

        if confidence < self.confidence_threshold {
            return Ok(None);
        }

        let relation_type = relation_type_for(a, b);
        let relation = self.storage.upsert_memory_relation(
            &a.id,
            &b.id,
            relation_type,
            confidence,
            method,
            false,
        )?;
        Ok(Some(relation))
    }

    fn supersedes_pair(&self, a: &Memory, b: &Memory) -> Result<Option<MemoryRelation>, StorageError> {
        if a.memory_type != b.memory_type {
            return Ok(None);
        }
        let overlap = jaccard(&tokenize(&a.title), &tokenize(&b.title));
        if overlap < SUPERSEDES_TITLE_OVERLAP {
            return Ok(None);
        }
        let (older, newer) = if a.created_at <= b.created_at { (a, b) } else { (b, a) };
        let relation = self.storage.upsert_memory_relation(
            &newer.id,
            &older.id,
            "supersedes",
            overlap,
            RelationDetectionMethod::TitleOverlap,
            false,
        )?;
        Ok(Some(relation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryInput;

    fn memory_with(storage: &Storage, memory_type: &str, title: &str, content: &str, files: &[&str]) -> Memory {
        storage
            .create_memory(MemoryInput {
                memory_type: memory_type.into(),
                title: title.into(),
                content: content.into(),
                tags: Vec::new(),
                related_files: files.iter().map(|f| f.to_string()).collect(),
                importance: 0.5,
            })
            .unwrap()
    }

    #[test]
    fn test_detect_all_links_memories_sharing_files() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        memory_with(&storage, "decision", "Use Postgres", "chose postgres", &["src/db.rs"]);
        memory_with(&storage, "solution", "Connection pooling", "added a pool", &["src/db.rs"]);

        let detector = MemoryRelationDetector::new(storage.clone());
        let relations = detector.detect_all().unwrap();
        assert!(!relations.is_empty());
        assert!(relations.iter().any(|r| r.relation_type == "causes"));
    }

    #[test]
    fn test_detect_all_flags_supersedes_on_title_overlap() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        memory_with(&storage, "note", "Retry logic for uploads", "first pass", &[]);
        memory_with(&storage, "note", "Retry logic for uploads v2", "revised", &[]);

        let detector = MemoryRelationDetector::new(storage.clone());
        let relations = detector.detect_all().unwrap();
        assert!(relations.iter().any(|r| r.relation_type == "supersedes"));
    }

    #[test]
    fn test_unrelated_memories_produce_no_relation() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        memory_with(&storage, "note", "Alpha", "nothing in common", &[]);
        memory_with(&storage, "note", "Zulu", "completely different topic entirely", &[]);

        let detector = MemoryRelationDetector::new(storage.clone());
        let relations = detector.detect_all().unwrap();
        assert!(relations.is_empty());
    }
}
