//! GraphRAG build orchestration (§4.5)
//!
//! Turns newly-written memories into entities, relationships, communities,
//! and community reports. Extraction uses an injected [`EntityExtractor`]
//! capability when one is registered, falling back to
//! [`heuristic_extract`] otherwise.

use super::community::{self, DEFAULT_MAX_LEVEL, DEFAULT_MIN_EDGE_STRENGTH};
use super::entities::{merge_or_create_entity, record_relationship};
use super::reports;
use crate::capability::{heuristic_extract, Embedder, EntityExtractor, VectorBackend};
use crate::model::VectorPayload;
use crate::storage::{Storage, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GraphragError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, GraphragError>;

/// Selects which memories to (re)process and whether to rebuild
/// communities/reports from scratch.
#[derive(Debug, Clone, Default)]
pub struct GraphragBuildOptions {
    /// Explicit memory ids to (re)process. `None` means "all memories not
    /// already linked into the graph", unless `reindex_all` is set.
    pub memory_ids: Option<Vec<String>>,
    /// Reprocess every memory regardless of existing links, and always
    /// rebuild communities/reports even if nothing changed.
    pub reindex_all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GraphragBuildResult {
    pub entities_processed: u32,
    pub relationships_created: u32,
    pub communities_built: u32,
    pub reports_generated: u32,
    /// True when no memory needed (re)processing and no rebuild ran.
    pub no_op: bool,
}

/// Orchestrates the entity/community graph build over a project's memories.
pub struct GraphragEngine {
    storage: Arc<Storage>,
    extractor: Option<Arc<dyn EntityExtractor>>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorBackend>,
    min_edge_strength: f32,
    max_level: u32,
    min_community_size: usize,
}

impl GraphragEngine {
    pub fn new(
        storage: Arc<Storage>,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorBackend>,
    ) -> Self {
        Self {
            storage,
            extractor: None,
            embedder,
            vectors,
            min_edge_strength: DEFAULT_MIN_EDGE_STRENGTH,
            max_level: DEFAULT_MAX_LEVEL,
            min_community_size: 1,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_min_community_size(mut self, min_community_size: usize) -> Self {
        self.min_community_size = min_community_size;
        self
    }

    /// Runs the build pipeline (§4.5 steps 1-7) per `options`.
    pub fn build(&self, options: &GraphragBuildOptions) -> Result<GraphragBuildResult> {
        let targets = self.select_targets(options)?;
        if targets.is_empty() && !options.reindex_all {
            return Ok(GraphragBuildResult {
                no_op: true,
                ..Default::default()
            });
        }

        let mut entities_processed = 0u32;
        let mut relationships_created = 0u32;
        let mut touched_entity_ids: Vec<String> = Vec::new();

        for memory_id in &targets {
            let memory = match self.storage.get_memory(memory_id) {
                Ok(memory) => memory,
                Err(err) => {
                    warn!(%memory_id, %err, "skipping memory missing from storage");
                    continue;
                }
            };

            // A targeted refresh (explicit memory_ids) can re-process a memory
            // that already has graph links just as much as a full reindex can,
            // so both need the stale links cleared first or mention_count and
            // relationships double up on reprocessing.
            if options.reindex_all || options.memory_ids.is_some() {
                self.storage.cascade_delete_memory_graph_links(memory_id)?;
            }

            let content = format!("{}\n{}", memory.title, memory.content);
            let extraction = self
                .extractor
                .as_ref()
                .and_then(|extractor| extractor.extract(&content))
                .unwrap_or_else(|| heuristic_extract(&content));

            let mut alias_map: HashMap<String, String> = HashMap::new();
            for extracted in &extraction.entities {
                let entity = merge_or_create_entity(&self.storage, extracted)?;
                self.storage
                    .link_entity_to_memory(&entity.id, memory_id, &extracted.mention_text)?;
                alias_map.insert(
                    super::entities::normalize_alias(&extracted.canonical_name),
                    entity.id.clone(),
                );
                touched_entity_ids.push(entity.id);
                entities_processed += 1;
            }

            for extracted in &extraction.relationships {
                if record_relationship(&self.storage, extracted, &alias_map, memory_id)?.is_some()
                {
                    relationships_created += 1;
                }
            }
        }

        self.embed_touched_entities(&touched_entity_ids)?;
        self.collect_orphans()?;

        let communities_built =
            community::rebuild_communities(&self.storage, self.max_level, self.min_edge_strength)?;
        let reports_generated = reports::generate_reports(
            &self.storage,
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            self.min_community_size,
        )?
        .len() as u32;

        Ok(GraphragBuildResult {
            entities_processed,
            relationships_created,
            communities_built,
            reports_generated,
            no_op: false,
        })
    }

    fn select_targets(&self, options: &GraphragBuildOptions) -> Result<Vec<String>> {
        if let Some(ids) = &options.memory_ids {
            return Ok(ids.clone());
        }
        if options.reindex_all {
            return Ok(self.all_memory_ids()?);
        }
        let mut targets = Vec::new();
        for id in self.all_memory_ids()? {
            if !self.storage.memory_has_graph_links(&id)? {
                targets.push(id);
            }
        }
        Ok(targets)
    }

    fn all_memory_ids(&self) -> Result<Vec<String>> {
        const PAGE: u32 = 500;
        let mut ids = Vec::new();
        let mut offset = 0u32;
        loop {
            let page = self.storage.list_memories(PAGE, offset)?;
            let page_len = page.len() as u32;
            ids.extend(page.into_iter().map(|m| m.id));
            if page_len < PAGE {
                break;
            }
            offset += PAGE;
        }
        Ok(ids)
    }

    fn embed_touched_entities(&self, entity_ids: &[String]) -> Result<()> {
        let mut unique: Vec<&String> = entity_ids.iter().collect();
        unique.sort();
        unique.dedup();

        for id in unique {
            let entity = match self.storage.get_entity(id) {
                Ok(entity) => entity,
                Err(_) => continue,
            };
            let text = format!("{}: {}", entity.canonical_name, entity.description);
            let Some(vector) = self.embedder.embed(&text) else {
                continue;
            };
            let key = format!("graphrag_entity:{}", entity.id);
            let payload = VectorPayload::GraphragEntity {
                entity_id: entity.id.clone(),
                canonical_name: entity.canonical_name.clone(),
                entity_type: entity.entity_type.clone(),
            };
            if self.vectors.upsert(&key, &vector, payload) {
                self.storage.set_entity_embedding_id(&entity.id, &key)?;
            }
        }
        Ok(())
    }

    fn collect_orphans(&self) -> Result<()> {
        for orphan in self.storage.find_orphaned_entities()? {
            debug!(entity_id = %orphan.id, "deleting orphaned entity");
            self.vectors
                .remove_key(&format!("graphrag_entity:{}", orphan.id));
            self.storage.delete_entity(&orphan.id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{SearchFilter, VectorMatch};
    use std::sync::Mutex;

    struct StubEmbedder;
    impl Embedder for StubEmbedder {
        fn embed(&self, _text: &str) -> Option<Vec<f32>> {
            Some(vec![0.1, 0.2])
        }
    }

    #[derive(Default)]
    struct RecordingVectors {
        removed: Mutex<Vec<String>>,
    }
    impl VectorBackend for RecordingVectors {
        fn upsert(&self, _key: &str, _vector: &[f32], _payload: VectorPayload) -> bool {
            true
        }
        fn search(&self, _query: &[f32], _limit: usize, _filter: &SearchFilter) -> Vec<VectorMatch> {
            Vec::new()
        }
        fn remove_by_memory_id(&self, memory_id: &str) -> usize {
            self.removed.lock().unwrap().push(memory_id.to_string());
            1
        }
        fn remove_key(&self, key: &str) -> bool {
            self.removed.lock().unwrap().push(key.to_string());
            true
        }
    }

    fn new_memory(storage: &Storage, content: &str) -> String {
        storage
            .create_memory(crate::model::MemoryInput {
                memory_type: "note".into(),
                title: "title".into(),
                content: content.into(),
                tags: Vec::new(),
                related_files: Vec::new(),
                importance: 0.5,
            })
            .unwrap()
            .id
    }

    #[test]
    fn test_build_extracts_entities_and_is_noop_on_second_pass() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let id = new_memory(&storage, "`PostgreSQL` is used by `OrderService`.");

        let engine = GraphragEngine::new(
            storage.clone(),
            Arc::new(StubEmbedder),
            Arc::new(RecordingVectors::default()),
        );

        let result = engine.build(&GraphragBuildOptions::default()).unwrap();
        assert!(!result.no_op);
        assert!(result.entities_processed >= 2);

        let second = engine.build(&GraphragBuildOptions::default()).unwrap();
        assert!(second.no_op);
        let _ = id;
    }

    #[test]
    fn test_build_with_explicit_memory_ids_reprocesses_targeted_memory() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let id = new_memory(&storage, "`Redis` caches results for `OrderService`.");

        let engine = GraphragEngine::new(
            storage.clone(),
            Arc::new(StubEmbedder),
            Arc::new(RecordingVectors::default()),
        );
        engine.build(&GraphragBuildOptions::default()).unwrap();

        let options = GraphragBuildOptions {
            memory_ids: Some(vec![id]),
            reindex_all: true,
        };
        let result = engine.build(&options).unwrap();
        assert!(!result.no_op);
        assert!(result.entities_processed >= 2);
    }

    #[test]
    fn test_targeted_refresh_without_reindex_all_does_not_double_count_mentions() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let id = new_memory(&storage, "`PostgreSQL` is used by `OrderService`.");

        let engine = GraphragEngine::new(
            storage.clone(),
            Arc::new(StubEmbedder),
            Arc::new(RecordingVectors::default()),
        );
        engine.build(&GraphragBuildOptions::default()).unwrap();

        let alias = super::super::entities::normalize_alias("PostgreSQL");
        let before = storage
            .find_entity_by_alias(&alias)
            .unwrap()
            .expect("entity should exist after first build");
        assert_eq!(before.mention_count, 1);

        // Targeted refresh of the same memory, without reindex_all: the
        // cascade-delete must still run so reprocessing doesn't bump
        // mention_count again for a mention that was already recorded.
        let options = GraphragBuildOptions {
            memory_ids: Some(vec![id]),
            reindex_all: false,
        };
        let result = engine.build(&options).unwrap();
        assert!(!result.no_op);

        let after = storage
            .find_entity_by_alias(&alias)
            .unwrap()
            .expect("entity should still exist after targeted refresh");
        assert_eq!(after.mention_count, 1);
    }
}
