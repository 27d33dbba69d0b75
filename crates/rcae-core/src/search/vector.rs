//! Embedded ANN vector store (§4.4)
//!
//! Wraps `usearch`'s HNSW index with a typed payload table and metadata
//! filtering. Vectors are keyed by string id (`"memory:<uuid>"`,
//! `"graphrag_entity:<id>"`, …); `usearch` itself only knows numeric ids, so
//! this module owns the id<->key mapping plus a side table of
//! [`crate::model::VectorPayload`] used to filter results post-search.

use crate::model::VectorPayload;
use std::collections::HashMap;
use std::path::Path;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

pub const DEFAULT_DIMENSIONS: usize = 256;
pub const DEFAULT_CONNECTIVITY: usize = 16;
pub const DEFAULT_EXPANSION_ADD: usize = 128;
pub const DEFAULT_EXPANSION_SEARCH: usize = 64;

/// Over-fetch factor applied before metadata filtering narrows results back
/// down to the caller's requested limit.
const FILTER_OVERFETCH: usize = 8;

#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorSearchError {
    #[error("index creation failed: {0}")]
    IndexCreation(String),
    #[error("failed to add vector: {0}")]
    IndexAdd(String),
    #[error("search failed: {0}")]
    IndexSearch(String),
    #[error("persistence failed: {0}")]
    IndexPersistence(String),
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("key not found: {0}")]
    KeyNotFound(u64),
}

#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    pub dimensions: usize,
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
    pub metric: MetricKind,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            connectivity: DEFAULT_CONNECTIVITY,
            expansion_add: DEFAULT_EXPANSION_ADD,
            expansion_search: DEFAULT_EXPANSION_SEARCH,
            metric: MetricKind::Cos,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorIndexStats {
    pub total_vectors: usize,
    pub dimensions: usize,
    pub connectivity: usize,
    pub memory_bytes: usize,
}

/// A metadata filter conjunction applied after ANN search (§4.4).
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub type_tag: Option<String>,
    pub tags_any_of: Vec<String>,
    pub related_files_any_of: Vec<String>,
    pub min_importance: Option<f64>,
}

impl VectorFilter {
    pub fn by_type(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: Some(type_tag.into()),
            ..Default::default()
        }
    }

    fn matches(&self, payload: &VectorPayload) -> bool {
        if let Some(type_tag) = &self.type_tag {
            if payload.type_tag() != type_tag {
                return false;
            }
        }
        if !self.tags_any_of.is_empty() {
            let tags = match payload {
                VectorPayload::Memory { tags, .. } => tags.as_slice(),
                _ => &[],
            };
            if !self.tags_any_of.iter().any(|t| tags.contains(t)) {
                return false;
            }
        }
        if !self.related_files_any_of.is_empty() {
            let files = match payload {
                VectorPayload::Memory { related_files, .. } => related_files.as_slice(),
                _ => &[],
            };
            if !self.related_files_any_of.iter().any(|f| files.contains(f)) {
                return false;
            }
        }
        if let Some(min_importance) = self.min_importance {
            let importance = match payload {
                VectorPayload::Memory { importance, .. } => *importance,
                _ => return false,
            };
            if importance < min_importance {
                return false;
            }
        }
        true
    }
}

/// A single match, ready for the assembler/retriever to consume.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub key: String,
    pub score: f32,
    pub payload: Option<VectorPayload>,
}

/// Embedded HNSW vector index with payload-aware filtered search.
pub struct VectorIndex {
    index: Index,
    config: VectorIndexConfig,
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    payloads: HashMap<String, VectorPayload>,
    next_id: u64,
}

impl VectorIndex {
    pub fn new() -> Result<Self, VectorSearchError> {
        Self::with_config(VectorIndexConfig::default())
    }

    pub fn with_config(config: VectorIndexConfig) -> Result<Self, VectorSearchError> {
        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: config.metric,
            quantization: ScalarKind::I8,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };

        let index =
            Index::new(&options).map_err(|e| VectorSearchError::IndexCreation(e.to_string()))?;

        Ok(Self {
            index,
            config,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            payloads: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn reserve(&self, capacity: usize) -> Result<(), VectorSearchError> {
        self.index
            .reserve(capacity)
            .map_err(|e| VectorSearchError::IndexCreation(format!("reserve failed: {e}")))
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), VectorSearchError> {
        if vector.len() != self.config.dimensions {
            return Err(VectorSearchError::DimensionMismatch {
                expected: self.config.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Upserts `key` with `vector` and its payload (dimension-checked).
    pub fn upsert(
        &mut self,
        key: &str,
        vector: &[f32],
        payload: VectorPayload,
    ) -> Result<(), VectorSearchError> {
        self.check_dimensions(vector)?;

        if let Some(&existing_id) = self.key_to_id.get(key) {
            self.index
                .remove(existing_id)
                .map_err(|e| VectorSearchError::IndexAdd(e.to_string()))?;
            self.reserve(self.index.size() + 1)?;
            self.index
                .add(existing_id, vector)
                .map_err(|e| VectorSearchError::IndexAdd(e.to_string()))?;
            self.payloads.insert(key.to_string(), payload);
            return Ok(());
        }

        let current_capacity = self.index.capacity();
        let current_size = self.index.size();
        if current_size >= current_capacity {
            let new_capacity = std::cmp::max(current_capacity * 2, 16);
            self.reserve(new_capacity)?;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.index
            .add(id, vector)
            .map_err(|e| VectorSearchError::IndexAdd(e.to_string()))?;

        self.key_to_id.insert(key.to_string(), id);
        self.id_to_key.insert(id, key.to_string());
        self.payloads.insert(key.to_string(), payload);

        Ok(())
    }

    /// Removes a vector by key. Returns `true` if it existed.
    pub fn remove(&mut self, key: &str) -> Result<bool, VectorSearchError> {
        self.payloads.remove(key);
        if let Some(id) = self.key_to_id.remove(key) {
            self.id_to_key.remove(&id);
            self.index
                .remove(id)
                .map_err(|e| VectorSearchError::IndexAdd(e.to_string()))?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Removes every vector whose payload belongs to `memory_id` (the
    /// multi-vector-family delete used when a memory is deleted).
    pub fn remove_by_memory_id(&mut self, memory_id: &str) -> Result<usize, VectorSearchError> {
        let keys: Vec<String> = self
            .payloads
            .iter()
            .filter(|(_, p)| matches!(p, VectorPayload::Memory { memory_id: m, .. } if m == memory_id))
            .map(|(k, _)| k.clone())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.key_to_id.contains_key(key)
    }

    pub fn payload(&self, key: &str) -> Option<&VectorPayload> {
        self.payloads.get(key)
    }

    /// Unfiltered nearest-neighbour search, scores normalized to `[0, 1]`.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<VectorHit>, VectorSearchError> {
        self.check_dimensions(query)?;

        if self.is_empty() {
            return Ok(vec![]);
        }

        let results = self
            .index
            .search(query, limit)
            .map_err(|e| VectorSearchError::IndexSearch(e.to_string()))?;

        let mut hits = Vec::with_capacity(results.keys.len());
        for (id, distance) in results.keys.iter().zip(results.distances.iter()) {
            if let Some(key) = self.id_to_key.get(id) {
                let score = (1.0 - distance).clamp(0.0, 1.0);
                hits.push(VectorHit {
                    key: key.clone(),
                    score,
                    payload: self.payloads.get(key).cloned(),
                });
            }
        }

        Ok(hits)
    }

    /// Nearest-neighbour search restricted to hits whose payload matches
    /// `filter`, over-fetching from the ANN index to compensate for
    /// post-filtering discarding candidates.
    pub fn search_filtered(
        &self,
        query: &[f32],
        limit: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorHit>, VectorSearchError> {
        let overfetched = self.search(query, limit.saturating_mul(FILTER_OVERFETCH).max(limit))?;
        Ok(overfetched
            .into_iter()
            .filter(|hit| hit.payload.as_ref().map(|p| filter.matches(p)).unwrap_or(false))
            .take(limit)
            .collect())
    }

    pub fn save(&self, path: &Path) -> Result<(), VectorSearchError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| VectorSearchError::IndexPersistence("invalid path".to_string()))?;

        self.index
            .save(path_str)
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;

        let mappings_path = path.with_extension("mappings.json");
        let mappings = serde_json::json!({
            "key_to_id": self.key_to_id,
            "next_id": self.next_id,
            "payloads": self.payloads,
        });
        let mappings_str = serde_json::to_string(&mappings)
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;
        std::fs::write(&mappings_path, mappings_str)
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;

        Ok(())
    }

    pub fn load(path: &Path, config: VectorIndexConfig) -> Result<Self, VectorSearchError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| VectorSearchError::IndexPersistence("invalid path".to_string()))?;

        let options = IndexOptions {
            dimensions: config.dimensions,
            metric: config.metric,
            quantization: ScalarKind::I8,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            multi: false,
        };

        let index =
            Index::new(&options).map_err(|e| VectorSearchError::IndexCreation(e.to_string()))?;

        index
            .load(path_str)
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;

        let mappings_path = path.with_extension("mappings.json");
        let mappings_str = std::fs::read_to_string(&mappings_path)
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;
        let mappings: serde_json::Value = serde_json::from_str(&mappings_str)
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;

        let key_to_id: HashMap<String, u64> = serde_json::from_value(mappings["key_to_id"].clone())
            .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;
        let payloads: HashMap<String, VectorPayload> =
            serde_json::from_value(mappings["payloads"].clone())
                .map_err(|e| VectorSearchError::IndexPersistence(e.to_string()))?;

        let next_id: u64 = mappings["next_id"]
            .as_u64()
            .ok_or_else(|| VectorSearchError::IndexPersistence("invalid next_id".to_string()))?;

        let id_to_key: HashMap<u64, String> =
            key_to_id.iter().map(|(k, &v)| (v, k.clone())).collect();

        Ok(Self {
            index,
            config,
            key_to_id,
            id_to_key,
            payloads,
            next_id,
        })
    }

    pub fn stats(&self) -> VectorIndexStats {
        VectorIndexStats {
            total_vectors: self.len(),
            dimensions: self.config.dimensions,
            connectivity: self.config.connectivity,
            memory_bytes: self.index.serialized_length(),
        }
    }
}

/// Adapts a mutex-guarded index to the capability-layer trait so
/// `graphrag`/`retriever`/`assembler` can depend on `Arc<dyn VectorBackend>`
/// without knowing the concrete ANN backend.
impl crate::capability::VectorBackend for std::sync::Mutex<VectorIndex> {
    fn upsert(&self, key: &str, vector: &[f32], payload: VectorPayload) -> bool {
        self.lock()
            .ok()
            .and_then(|mut index| index.upsert(key, vector, payload).ok())
            .is_some()
    }

    fn search(
        &self,
        query: &[f32],
        limit: usize,
        filter: &crate::capability::SearchFilter,
    ) -> Vec<crate::capability::VectorMatch> {
        let Ok(index) = self.lock() else { return Vec::new() };
        let vector_filter = VectorFilter {
            type_tag: filter.type_tag.map(str::to_string),
            min_importance: filter.min_importance,
            ..Default::default()
        };
        let hits = if filter.type_tag.is_some() || filter.min_importance.is_some() {
            index.search_filtered(query, limit, &vector_filter)
        } else {
            index.search(query, limit)
        };
        hits.unwrap_or_default()
            .into_iter()
            .map(|hit| crate::capability::VectorMatch {
                key: hit.key,
                score: hit.score,
                payload: hit.payload,
            })
            .collect()
    }

    fn remove_by_memory_id(&self, memory_id: &str) -> usize {
        self.lock()
            .ok()
            .and_then(|mut index| index.remove_by_memory_id(memory_id).ok())
            .unwrap_or(0)
    }

    fn remove_key(&self, key: &str) -> bool {
        self.lock()
            .ok()
            .and_then(|mut index| index.remove(key).ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_vector(seed: f32) -> Vec<f32> {
        (0..DEFAULT_DIMENSIONS)
            .map(|i| ((i as f32 + seed) / DEFAULT_DIMENSIONS as f32).sin())
            .collect()
    }

    fn memory_payload(importance: f64, tags: &[&str]) -> VectorPayload {
        VectorPayload::Memory {
            memory_id: "m1".into(),
            title: "t".into(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            related_files: vec![],
            importance,
        }
    }

    #[test]
    fn test_index_creation() {
        let index = VectorIndex::new().unwrap();
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_upsert_and_search() {
        let mut index = VectorIndex::new().unwrap();

        let v1 = create_test_vector(1.0);
        let v2 = create_test_vector(2.0);
        let v3 = create_test_vector(100.0);

        index.upsert("node-1", &v1, memory_payload(0.5, &[])).unwrap();
        index.upsert("node-2", &v2, memory_payload(0.5, &[])).unwrap();
        index.upsert("node-3", &v3, memory_payload(0.5, &[])).unwrap();

        assert_eq!(index.len(), 3);
        assert!(index.contains("node-1"));
        assert!(!index.contains("node-999"));

        let results = index.search(&v1, 3).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].key, "node-1");
        assert!(results[0].score >= 0.99);
    }

    #[test]
    fn test_remove() {
        let mut index = VectorIndex::new().unwrap();
        let v1 = create_test_vector(1.0);

        index.upsert("node-1", &v1, memory_payload(0.5, &[])).unwrap();
        assert!(index.contains("node-1"));

        index.remove("node-1").unwrap();
        assert!(!index.contains("node-1"));
        assert!(index.payload("node-1").is_none());
    }

    #[test]
    fn test_remove_by_memory_id() {
        let mut index = VectorIndex::new().unwrap();
        let v1 = create_test_vector(1.0);
        index
            .upsert("memory:m1", &v1, VectorPayload::Memory {
                memory_id: "m1".into(),
                title: "t".into(),
                tags: vec![],
                related_files: vec![],
                importance: 0.5,
            })
            .unwrap();
        let removed = index.remove_by_memory_id("m1").unwrap();
        assert_eq!(removed, 1);
        assert!(index.is_empty());
    }

    #[test]
    fn test_update() {
        let mut index = VectorIndex::new().unwrap();
        let v1 = create_test_vector(1.0);
        let v2 = create_test_vector(2.0);

        index.upsert("node-1", &v1, memory_payload(0.5, &[])).unwrap();
        assert_eq!(index.len(), 1);

        index.upsert("node-1", &v2, memory_payload(0.9, &[])).unwrap();
        assert_eq!(index.len(), 1);
        assert!(matches!(
            index.payload("node-1"),
            Some(VectorPayload::Memory { importance, .. }) if (*importance - 0.9).abs() < f64::EPSILON
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = VectorIndex::new().unwrap();
        let wrong_size: Vec<f32> = vec![1.0, 2.0, 3.0];

        let result = index.upsert("node-1", &wrong_size, memory_payload(0.5, &[]));
        assert!(matches!(
            result,
            Err(VectorSearchError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_search_filtered_by_min_importance() {
        let mut index = VectorIndex::new().unwrap();
        let v1 = create_test_vector(1.0);
        let v2 = create_test_vector(1.1);

        index.upsert("low", &v1, memory_payload(0.1, &[])).unwrap();
        index.upsert("high", &v2, memory_payload(0.9, &[])).unwrap();

        let filter = VectorFilter {
            min_importance: Some(0.5),
            ..Default::default()
        };
        let results = index.search_filtered(&v1, 10, &filter).unwrap();
        assert!(results.iter().all(|h| h.key == "high"));
    }

    #[test]
    fn test_search_filtered_by_tags() {
        let mut index = VectorIndex::new().unwrap();
        let v1 = create_test_vector(1.0);
        let v2 = create_test_vector(1.1);

        index.upsert("a", &v1, memory_payload(0.5, &["rust"])).unwrap();
        index.upsert("b", &v2, memory_payload(0.5, &["python"])).unwrap();

        let filter = VectorFilter {
            tags_any_of: vec!["rust".into()],
            ..Default::default()
        };
        let results = index.search_filtered(&v1, 10, &filter).unwrap();
        assert!(results.iter().all(|h| h.key == "a"));
    }

    #[test]
    fn test_stats() {
        let mut index = VectorIndex::new().unwrap();
        let v1 = create_test_vector(1.0);

        index.upsert("node-1", &v1, memory_payload(0.5, &[])).unwrap();

        let stats = index.stats();
        assert_eq!(stats.total_vectors, 1);
        assert_eq!(stats.dimensions, DEFAULT_DIMENSIONS);
    }
}
