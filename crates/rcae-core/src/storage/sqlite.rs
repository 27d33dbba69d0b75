//! SQLite storage implementation
//!
//! Core persistence layer. Uses separate reader/writer connections so
//! `Storage` is `Send + Sync` and callers can share it behind `Arc<Storage>`
//! instead of `Arc<Mutex<Storage>>`.

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

use crate::model::{
    vector_id_for_memory, CodeEdge, CodeEdgeKind, CodeNode, CodeNodeKind, Community,
    CommunityReport, CrossLayerRelation, Entity, FileHash, Memory, MemoryInput, MemoryRelation,
    RelationDetectionMethod, Relationship,
};

// ============================================================================
// ERROR TYPE
// ============================================================================

/// Storage error type (§7 `StorageError`).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("initialization error: {0}")]
    Init(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

fn row_not_found(id: &str) -> StorageError {
    StorageError::NotFound(id.to_string())
}

// ============================================================================
// STORAGE
// ============================================================================

/// The embedded transactional store backing every tabular entity in
/// [`crate::model`] (§4.1).
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl Storage {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Opens (creating if needed) the store at `db_path`, or at the
    /// platform-default data directory when `None`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("dev", "rcae", "rcae").ok_or_else(|| {
                    StorageError::Init("could not determine project directories".to_string())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perms = std::fs::Permissions::from_mode(0o700);
                    let _ = std::fs::set_permissions(data_dir, perms);
                }
                data_dir.join("rcae.db")
            }
        };

        let writer_conn = Connection::open(&path)?;

        #[cfg(unix)]
        if path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&path, perms);
        }

        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Opens the default platform-specific store.
    pub fn open_default() -> Result<Self> {
        Self::new(None)
    }

    /// Opens an in-memory store, primarily for tests.
    ///
    /// Reader and writer must share the same shared-cache in-memory
    /// database, not two independent ones, or writes through one connection
    /// would be invisible to reads through the other. Each call gets a
    /// uniquely named database so parallel tests don't collide.
    pub fn open_in_memory() -> Result<Self> {
        let uri = format!("file:rcae_mem_{}?mode=memory&cache=shared", Uuid::new_v4());
        let writer_conn = Connection::open(&uri)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;
        let reader_conn = Connection::open(&uri)?;
        Self::configure_connection(&reader_conn)?;
        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    fn writer(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))
    }

    fn reader(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| StorageError::Init("reader lock poisoned".into()))
    }

    // ========================================================================
    // MEMORY CRUD
    // ========================================================================

    pub fn create_memory(&self, input: MemoryInput) -> Result<Memory> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let qdrant_id = vector_id_for_memory(&id);
        let tags = dedup_case_insensitive(&input.tags);
        let tags_json = serde_json::to_string(&tags)?;
        let files_json = serde_json::to_string(&input.related_files)?;

        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO memories
                (id, memory_type, title, content, tags, related_files, importance,
                 created_at, accessed_at, last_refreshed_at, qdrant_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10)",
            params![
                id,
                input.memory_type,
                input.title,
                input.content,
                tags_json,
                files_json,
                input.importance,
                now.to_rfc3339(),
                now.to_rfc3339(),
                qdrant_id,
            ],
        )?;

        Ok(Memory {
            id,
            memory_type: input.memory_type,
            title: input.title,
            content: input.content,
            tags,
            related_files: input.related_files,
            importance: input.importance,
            created_at: now,
            accessed_at: now,
            last_refreshed_at: None,
            qdrant_id,
        })
    }

    pub fn get_memory(&self, id: &str) -> Result<Memory> {
        let conn = self.reader()?;
        conn.query_row(
            "SELECT id, memory_type, title, content, tags, related_files, importance,
                    created_at, accessed_at, last_refreshed_at, qdrant_id
             FROM memories WHERE id = ?1",
            params![id],
            row_to_memory,
        )
        .optional()?
        .ok_or_else(|| row_not_found(id))
    }

    /// Updates a memory, re-embedding only when `title` or `content` changed
    /// (tracked by the returned flag — the caller invalidates the vector and
    /// re-embeds when `true`, per §3 Memory lifecycle).
    pub fn update_memory(
        &self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        tags: Option<Vec<String>>,
        related_files: Option<Vec<String>>,
        importance: Option<f64>,
    ) -> Result<(Memory, bool)> {
        let existing = self.get_memory(id)?;
        let needs_reembed = title.is_some() || content.is_some();

        let new_title = title.unwrap_or(existing.title);
        let new_content = content.unwrap_or(existing.content);
        let new_tags = tags
            .map(|t| dedup_case_insensitive(&t))
            .unwrap_or(existing.tags);
        let new_files = related_files.unwrap_or(existing.related_files);
        let new_importance = importance.unwrap_or(existing.importance);

        let tags_json = serde_json::to_string(&new_tags)?;
        let files_json = serde_json::to_string(&new_files)?;

        let conn = self.writer()?;
        conn.execute(
            "UPDATE memories SET title = ?1, content = ?2, tags = ?3, related_files = ?4,
                importance = ?5, accessed_at = ?6 WHERE id = ?7",
            params![
                new_title,
                new_content,
                tags_json,
                files_json,
                new_importance,
                Utc::now().to_rfc3339(),
                id
            ],
        )?;
        drop(conn);

        Ok((self.get_memory(id)?, needs_reembed))
    }

    pub fn touch_memory_refreshed(&self, id: &str) -> Result<()> {
        let conn = self.writer()?;
        let affected = conn.execute(
            "UPDATE memories SET last_refreshed_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(row_not_found(id));
        }
        Ok(())
    }

    /// Deletes a memory, cascading to relations, suggestions, and
    /// entity-memory links (§3 Memory lifecycle: "deleted (cascades vector +
    /// relations + suggestions + cross-layer links)"). Vector deletion is the
    /// caller's responsibility (the vector store is a separate owner, §3).
    pub fn delete_memory(&self, id: &str) -> Result<()> {
        let conn = self.writer()?;
        let affected = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(row_not_found(id));
        }
        Ok(())
    }

    pub fn list_memories(&self, limit: u32, offset: u32) -> Result<Vec<Memory>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, memory_type, title, content, tags, related_files, importance,
                    created_at, accessed_at, last_refreshed_at, qdrant_id
             FROM memories ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit, offset], row_to_memory)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Sanitized FTS5 query over memory title/content/tags.
    pub fn search_memories_fts(&self, query: &str, limit: u32) -> Result<Vec<Memory>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.memory_type, m.title, m.content, m.tags, m.related_files,
                    m.importance, m.created_at, m.accessed_at, m.last_refreshed_at, m.qdrant_id
             FROM memories_fts f
             JOIN memories m ON m.id = f.id
             WHERE memories_fts MATCH ?1
             ORDER BY bm25(memories_fts) LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![sanitized, limit], row_to_memory)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ========================================================================
    // CODE GRAPH CRUD
    // ========================================================================

    /// Upserts a batch of code nodes and their edges in a single transaction,
    /// per §4.2 step 7 ("apply all DB mutations in a transaction per batch")
    /// and §5 ("nodes are upserted before the edges that reference them").
    pub fn upsert_code_batch(&self, nodes: &[CodeNode], edges: &[CodeEdge]) -> Result<()> {
        let mut conn = self.writer()?;
        let tx = conn.transaction()?;
        for node in nodes {
            let metadata_json = serde_json::to_string(&node.metadata)?;
            tx.execute(
                "INSERT INTO code_nodes
                    (id, kind, name, file_path, start_line, end_line, signature, summary,
                     summary_confidence, needs_ai_summary, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    kind = excluded.kind, name = excluded.name, file_path = excluded.file_path,
                    start_line = excluded.start_line, end_line = excluded.end_line,
                    signature = excluded.signature, summary = excluded.summary,
                    summary_confidence = excluded.summary_confidence,
                    needs_ai_summary = excluded.needs_ai_summary,
                    metadata = excluded.metadata, updated_at = excluded.updated_at",
                params![
                    node.id,
                    node.kind.as_str(),
                    node.name,
                    node.file_path,
                    node.start_line,
                    node.end_line,
                    node.signature,
                    node.summary,
                    node.summary_confidence,
                    node.needs_ai_summary,
                    metadata_json,
                    node.created_at.to_rfc3339(),
                    node.updated_at.to_rfc3339(),
                ],
            )?;
        }
        for edge in edges {
            let metadata_json = serde_json::to_string(&edge.metadata)?;
            tx.execute(
                "INSERT INTO code_edges (id, from_node, to_node, edge_type, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(from_node, to_node, edge_type) DO UPDATE SET metadata = excluded.metadata",
                params![edge.id, edge.from_node, edge.to_node, edge.edge_type.as_str(), metadata_json],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_code_node(&self, id: &str) -> Result<CodeNode> {
        let conn = self.reader()?;
        conn.query_row(
            "SELECT id, kind, name, file_path, start_line, end_line, signature, summary,
                    summary_confidence, needs_ai_summary, metadata, created_at, updated_at
             FROM code_nodes WHERE id = ?1",
            params![id],
            row_to_code_node,
        )
        .optional()?
        .ok_or_else(|| row_not_found(id))
    }

    pub fn delete_code_nodes_for_file(&self, file_path: &str) -> Result<u32> {
        let conn = self.writer()?;
        let affected = conn.execute(
            "DELETE FROM code_nodes WHERE file_path = ?1",
            params![file_path],
        )?;
        Ok(affected as u32)
    }

    /// All persisted code nodes, for cross-layer relation detection (§4.8).
    pub fn all_code_nodes(&self) -> Result<Vec<CodeNode>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, name, file_path, start_line, end_line, signature, summary,
                    summary_confidence, needs_ai_summary, metadata, created_at, updated_at
             FROM code_nodes",
        )?;
        let rows = stmt
            .query_map([], row_to_code_node)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn get_unsummarized_nodes(&self, limit: u32) -> Result<Vec<CodeNode>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, name, file_path, start_line, end_line, signature, summary,
                    summary_confidence, needs_ai_summary, metadata, created_at, updated_at
             FROM code_nodes WHERE needs_ai_summary = 1 LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], row_to_code_node)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn update_node_summary(&self, id: &str, summary: &str, confidence: f32) -> Result<()> {
        let conn = self.writer()?;
        let affected = conn.execute(
            "UPDATE code_nodes SET summary = ?1, summary_confidence = ?2, needs_ai_summary = 0,
                updated_at = ?3 WHERE id = ?4",
            params![summary, confidence, Utc::now().to_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(row_not_found(id));
        }
        Ok(())
    }

    /// Outgoing and incoming edges for a node, for call-graph/dependency
    /// queries (§6 `get_call_graph`, `get_dependency_tree`).
    pub fn get_edges_for_node(&self, node_id: &str) -> Result<(Vec<CodeEdge>, Vec<CodeEdge>)> {
        let conn = self.reader()?;
        let mut out_stmt = conn.prepare(
            "SELECT id, from_node, to_node, edge_type, metadata FROM code_edges WHERE from_node = ?1",
        )?;
        let outgoing = out_stmt
            .query_map(params![node_id], row_to_code_edge)?
            .filter_map(|r| r.ok())
            .collect();

        let mut in_stmt = conn.prepare(
            "SELECT id, from_node, to_node, edge_type, metadata FROM code_edges WHERE to_node = ?1",
        )?;
        let incoming = in_stmt
            .query_map(params![node_id], row_to_code_edge)?
            .filter_map(|r| r.ok())
            .collect();

        Ok((outgoing, incoming))
    }

    pub fn get_file_hash(&self, file_path: &str) -> Result<Option<FileHash>> {
        let conn = self.reader()?;
        let hash = conn
            .query_row(
                "SELECT file_path, hash, scanned_at FROM file_hashes WHERE file_path = ?1",
                params![file_path],
                row_to_file_hash,
            )
            .optional()?;
        Ok(hash)
    }

    pub fn upsert_file_hash(&self, file_path: &str, hash: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO file_hashes (file_path, hash, scanned_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_path) DO UPDATE SET hash = excluded.hash, scanned_at = excluded.scanned_at",
            params![file_path, hash, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_file_hash(&self, file_path: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "DELETE FROM file_hashes WHERE file_path = ?1",
            params![file_path],
        )?;
        Ok(())
    }

    pub fn all_file_hashes(&self) -> Result<Vec<FileHash>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare("SELECT file_path, hash, scanned_at FROM file_hashes")?;
        let rows = stmt
            .query_map([], row_to_file_hash)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ========================================================================
    // GRAPHRAG: ENTITIES, RELATIONSHIPS, COMMUNITIES, REPORTS
    // ========================================================================

    pub fn find_entity_by_alias(&self, alias_key: &str) -> Result<Option<Entity>> {
        let conn = self.reader()?;
        let entity = conn
            .query_row(
                "SELECT id, canonical_name, entity_type, description, mention_count,
                        extraction_confidence, embedding_id, created_at, updated_at
                 FROM entities WHERE alias_key = ?1",
                params![alias_key],
                row_to_entity,
            )
            .optional()?;
        Ok(entity)
    }

    /// Fuzzy alias lookup: exact, substring, or containment match against
    /// existing canonical alias keys (§4.5 step 3 entity merging).
    pub fn find_entity_fuzzy(&self, alias_key: &str) -> Result<Option<Entity>> {
        if let Some(entity) = self.find_entity_by_alias(alias_key)? {
            return Ok(Some(entity));
        }
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, canonical_name, entity_type, description, mention_count,
                    extraction_confidence, embedding_id, created_at, updated_at, alias_key
             FROM entities",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let existing_alias: String = row.get(9)?;
            if existing_alias.contains(alias_key) || alias_key.contains(existing_alias.as_str()) {
                return Ok(Some(Entity {
                    id: row.get(0)?,
                    canonical_name: row.get(1)?,
                    entity_type: row.get(2)?,
                    description: row.get(3)?,
                    mention_count: row.get(4)?,
                    extraction_confidence: row.get(5)?,
                    embedding_id: row.get(6)?,
                    created_at: parse_timestamp(&row.get::<_, String>(7)?)?,
                    updated_at: parse_timestamp(&row.get::<_, String>(8)?)?,
                }));
            }
        }
        Ok(None)
    }

    pub fn create_entity(
        &self,
        alias_key: &str,
        canonical_name: &str,
        entity_type: &str,
        description: &str,
        confidence: f32,
    ) -> Result<Entity> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO entities
                (id, canonical_name, alias_key, entity_type, description, mention_count,
                 extraction_confidence, embedding_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, NULL, ?7, ?8)",
            params![
                id,
                canonical_name,
                alias_key,
                entity_type,
                description,
                confidence,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;
        Ok(Entity {
            id,
            canonical_name: canonical_name.to_string(),
            entity_type: entity_type.to_string(),
            description: description.to_string(),
            mention_count: 1,
            extraction_confidence: confidence,
            embedding_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merges a new mention into an existing entity: bump `mention_count`,
    /// keep the higher confidence, and blend descriptions when the new one
    /// adds information (§4.5 step 3).
    pub fn merge_entity_mention(
        &self,
        id: &str,
        description: &str,
        confidence: f32,
    ) -> Result<Entity> {
        let existing = self.get_entity(id)?;
        let merged_confidence = existing.extraction_confidence.max(confidence);
        let merged_description = if description.len() > existing.description.len() {
            description.to_string()
        } else {
            existing.description.clone()
        };
        let conn = self.writer()?;
        conn.execute(
            "UPDATE entities SET mention_count = mention_count + 1, extraction_confidence = ?1,
                description = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                merged_confidence,
                merged_description,
                Utc::now().to_rfc3339(),
                id
            ],
        )?;
        drop(conn);
        self.get_entity(id)
    }

    pub fn get_entity(&self, id: &str) -> Result<Entity> {
        let conn = self.reader()?;
        conn.query_row(
            "SELECT id, canonical_name, entity_type, description, mention_count,
                    extraction_confidence, embedding_id, created_at, updated_at
             FROM entities WHERE id = ?1",
            params![id],
            row_to_entity,
        )
        .optional()?
        .ok_or_else(|| row_not_found(id))
    }

    pub fn set_entity_embedding_id(&self, id: &str, embedding_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "UPDATE entities SET embedding_id = ?1 WHERE id = ?2",
            params![embedding_id, id],
        )?;
        Ok(())
    }

    pub fn link_entity_to_memory(
        &self,
        entity_id: &str,
        memory_id: &str,
        mention_text: &str,
    ) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO entity_memory_links (entity_id, memory_id, mention_text) VALUES (?1, ?2, ?3)
             ON CONFLICT(entity_id, memory_id) DO UPDATE SET mention_text = excluded.mention_text",
            params![entity_id, memory_id, mention_text],
        )?;
        Ok(())
    }

    /// True if this memory has already contributed entity mentions, for the
    /// full-pass skip-already-processed path of §4.5 step 1.
    pub fn memory_has_graph_links(&self, memory_id: &str) -> Result<bool> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entity_memory_links WHERE memory_id = ?1",
            params![memory_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Deletes the entity/relationship/community-membership footprint of a
    /// single memory, for the targeted-refresh path of §4.5 step 1 and for
    /// full memory deletion.
    pub fn cascade_delete_memory_graph_links(&self, memory_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "DELETE FROM entity_memory_links WHERE memory_id = ?1",
            params![memory_id],
        )?;
        conn.execute(
            "DELETE FROM relationship_memory_links WHERE memory_id = ?1",
            params![memory_id],
        )?;
        conn.execute(
            "DELETE FROM memory_relations WHERE source_memory_id = ?1 OR target_memory_id = ?1",
            params![memory_id],
        )?;
        conn.execute(
            "DELETE FROM cross_layer_relations WHERE memory_id = ?1",
            params![memory_id],
        )?;
        Ok(())
    }

    /// Entities with no remaining memory links, for orphan garbage collection
    /// (§9 Open Question — decided: delete, see DESIGN.md).
    pub fn find_orphaned_entities(&self) -> Result<Vec<Entity>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT e.id, e.canonical_name, e.entity_type, e.description, e.mention_count,
                    e.extraction_confidence, e.embedding_id, e.created_at, e.updated_at
             FROM entities e
             LEFT JOIN entity_memory_links l ON l.entity_id = e.id
             WHERE l.entity_id IS NULL",
        )?;
        let rows = stmt
            .query_map([], row_to_entity)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn delete_entity(&self, id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute("DELETE FROM entities WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn all_entities(&self) -> Result<Vec<Entity>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, canonical_name, entity_type, description, mention_count,
                    extraction_confidence, embedding_id, created_at, updated_at FROM entities",
        )?;
        let rows = stmt
            .query_map([], row_to_entity)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn upsert_relationship(
        &self,
        source_entity_id: &str,
        target_entity_id: &str,
        relationship_type: &str,
        description: &str,
        strength: f32,
        memory_id: &str,
    ) -> Result<Relationship> {
        if source_entity_id == target_entity_id {
            return Err(StorageError::Init(
                "relationship cannot be a self-loop".into(),
            ));
        }
        let id = Relationship::make_id(source_entity_id, target_entity_id, relationship_type);
        let now = Utc::now();
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO relationships
                (id, source_entity_id, target_entity_id, relationship_type, description, strength, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source_entity_id, target_entity_id, relationship_type)
             DO UPDATE SET strength = MAX(strength, excluded.strength), description = excluded.description",
            params![id, source_entity_id, target_entity_id, relationship_type, description, strength, now.to_rfc3339()],
        )?;
        conn.execute(
            "INSERT INTO relationship_memory_links (relationship_id, memory_id, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(relationship_id, memory_id) DO UPDATE SET description = excluded.description",
            params![id, memory_id, description],
        )?;
        Ok(Relationship {
            id,
            source_entity_id: source_entity_id.to_string(),
            target_entity_id: target_entity_id.to_string(),
            relationship_type: relationship_type.to_string(),
            description: description.to_string(),
            strength,
            source_memory_ids: vec![memory_id.to_string()],
            created_at: now,
        })
    }

    pub fn relationships_above_threshold(&self, min_strength: f32) -> Result<Vec<Relationship>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_entity_id, target_entity_id, relationship_type, description, strength, created_at
             FROM relationships WHERE strength >= ?1",
        )?;
        let rows = stmt
            .query_map(params![min_strength], row_to_relationship)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn relationships_for_entity(
        &self,
        entity_id: &str,
        min_strength: f32,
    ) -> Result<Vec<Relationship>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_entity_id, target_entity_id, relationship_type, description, strength, created_at
             FROM relationships
             WHERE (source_entity_id = ?1 OR target_entity_id = ?1) AND strength >= ?2",
        )?;
        let rows = stmt
            .query_map(params![entity_id, min_strength], row_to_relationship)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Clears the entire community hierarchy, per §4.5 step 6 ("clear and
    /// rebuild the community hierarchy from scratch whenever the graph
    /// changed").
    pub fn clear_communities(&self) -> Result<()> {
        let conn = self.writer()?;
        conn.execute("DELETE FROM community_reports", [])?;
        conn.execute("DELETE FROM communities", [])?;
        Ok(())
    }

    pub fn insert_community(
        &self,
        level: u32,
        parent_id: Option<&str>,
        entity_ids: &[String],
    ) -> Result<Community> {
        let now = Utc::now();
        let id = format!("community:{}", Uuid::new_v4());
        let entity_ids_json = serde_json::to_string(entity_ids)?;
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO communities (id, level, parent_id, entity_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                level,
                parent_id,
                entity_ids_json,
                now.to_rfc3339(),
                now.to_rfc3339()
            ],
        )?;
        Ok(Community {
            id,
            level,
            parent_id: parent_id.map(str::to_string),
            entity_ids: entity_ids.to_vec(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn communities_at_level(&self, level: u32) -> Result<Vec<Community>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, level, parent_id, entity_ids, created_at, updated_at FROM communities WHERE level = ?1",
        )?;
        let rows = stmt
            .query_map(params![level], row_to_community)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Links a lower-level community to the higher-level community that
    /// contracted it (§4.5 step 6 hierarchy).
    pub fn set_community_parent(&self, id: &str, parent_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "UPDATE communities SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![parent_id, Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn all_communities(&self) -> Result<Vec<Community>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, level, parent_id, entity_ids, created_at, updated_at FROM communities",
        )?;
        let rows = stmt
            .query_map([], row_to_community)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn upsert_community_report(
        &self,
        community_id: &str,
        title: &str,
        summary: &str,
    ) -> Result<CommunityReport> {
        let now = Utc::now();
        let id = format!("report:{community_id}");
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO community_reports (id, community_id, title, summary, embedding_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6)
             ON CONFLICT(community_id) DO UPDATE SET title = excluded.title, summary = excluded.summary,
                updated_at = excluded.updated_at",
            params![id, community_id, title, summary, now.to_rfc3339(), now.to_rfc3339()],
        )?;
        Ok(CommunityReport {
            id,
            community_id: community_id.to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            embedding_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_report_embedding_id(&self, report_id: &str, embedding_id: &str) -> Result<()> {
        let conn = self.writer()?;
        conn.execute(
            "UPDATE community_reports SET embedding_id = ?1 WHERE id = ?2",
            params![embedding_id, report_id],
        )?;
        Ok(())
    }

    pub fn all_community_reports(&self) -> Result<Vec<CommunityReport>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, community_id, title, summary, embedding_id, created_at, updated_at FROM community_reports",
        )?;
        let rows = stmt
            .query_map([], row_to_report)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ========================================================================
    // RELATION SUGGESTIONS (§4.8)
    // ========================================================================

    pub fn upsert_memory_relation(
        &self,
        source_memory_id: &str,
        target_memory_id: &str,
        relation_type: &str,
        confidence: f32,
        detection_method: RelationDetectionMethod,
        auto_applied: bool,
    ) -> Result<MemoryRelation> {
        let id = Uuid::new_v4().to_string();
        let method_str = detection_method_str(detection_method);
        let now = Utc::now();
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO memory_relations
                (id, source_memory_id, target_memory_id, relation_type, confidence,
                 detection_method, auto_applied, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(source_memory_id, target_memory_id, detection_method)
             DO UPDATE SET relation_type = excluded.relation_type, confidence = excluded.confidence,
                auto_applied = excluded.auto_applied",
            params![
                id,
                source_memory_id,
                target_memory_id,
                relation_type,
                confidence,
                method_str,
                auto_applied,
                now.to_rfc3339(),
            ],
        )?;
        Ok(MemoryRelation {
            id,
            source_memory_id: source_memory_id.to_string(),
            target_memory_id: target_memory_id.to_string(),
            relation_type: relation_type.to_string(),
            confidence,
            detection_method,
            auto_applied,
            created_at: now,
        })
    }

    pub fn list_pending_memory_relations(&self) -> Result<Vec<MemoryRelation>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_memory_id, target_memory_id, relation_type, confidence,
                    detection_method, auto_applied, created_at
             FROM memory_relations WHERE auto_applied = 0",
        )?;
        let rows = stmt
            .query_map([], row_to_memory_relation)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn upsert_cross_layer_relation(
        &self,
        memory_id: &str,
        code_node_id: &str,
        relation_type: &str,
        confidence: f32,
        detection_method: RelationDetectionMethod,
    ) -> Result<CrossLayerRelation> {
        let id = Uuid::new_v4().to_string();
        let method_str = detection_method_str(detection_method);
        let now = Utc::now();
        let conn = self.writer()?;
        conn.execute(
            "INSERT INTO cross_layer_relations
                (id, memory_id, code_node_id, relation_type, confidence, detection_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(memory_id, code_node_id, detection_method)
             DO UPDATE SET relation_type = excluded.relation_type, confidence = excluded.confidence",
            params![id, memory_id, code_node_id, relation_type, confidence, method_str, now.to_rfc3339()],
        )?;
        Ok(CrossLayerRelation {
            id,
            memory_id: memory_id.to_string(),
            code_node_id: code_node_id.to_string(),
            relation_type: relation_type.to_string(),
            confidence,
            detection_method,
            created_at: now,
        })
    }

    pub fn list_cross_layer_relations(&self) -> Result<Vec<CrossLayerRelation>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, memory_id, code_node_id, relation_type, confidence, detection_method, created_at
             FROM cross_layer_relations",
        )?;
        let rows = stmt
            .query_map([], row_to_cross_layer_relation)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// All relations touching `memory_id` on either side.
    pub fn memory_relations_for(&self, memory_id: &str) -> Result<Vec<MemoryRelation>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_memory_id, target_memory_id, relation_type, confidence,
                    detection_method, auto_applied, created_at
             FROM memory_relations WHERE source_memory_id = ?1 OR target_memory_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![memory_id], row_to_memory_relation)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    pub fn delete_memory_relation(&self, id: &str) -> Result<()> {
        let conn = self.writer()?;
        let changed = conn.execute("DELETE FROM memory_relations WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(row_not_found(id));
        }
        Ok(())
    }

    pub fn delete_cross_layer_relation(&self, id: &str) -> Result<()> {
        let conn = self.writer()?;
        let changed = conn.execute("DELETE FROM cross_layer_relations WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(row_not_found(id));
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Collapses tags that differ only by case, keeping first occurrence order
/// (§3 Memory invariant: "tags unique case-insensitive").
fn dedup_case_insensitive(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        if seen.insert(tag.to_lowercase()) {
            out.push(tag.clone());
        }
    }
    out
}

fn detection_method_str(method: RelationDetectionMethod) -> &'static str {
    match method {
        RelationDetectionMethod::SharedFiles => "shared_files",
        RelationDetectionMethod::TemporalProximity => "temporal_proximity",
        RelationDetectionMethod::TagOverlap => "tag_overlap",
        RelationDetectionMethod::EmbeddingSimilarity => "embedding_similarity",
        RelationDetectionMethod::TitleOverlap => "title_overlap",
        RelationDetectionMethod::CodeIdentifierReference => "code_identifier_reference",
        RelationDetectionMethod::ExactFilePathMatch => "exact_file_path_match",
        RelationDetectionMethod::KeywordMatch => "keyword_match",
    }
}

fn parse_detection_method(s: &str) -> RelationDetectionMethod {
    match s {
        "shared_files" => RelationDetectionMethod::SharedFiles,
        "temporal_proximity" => RelationDetectionMethod::TemporalProximity,
        "tag_overlap" => RelationDetectionMethod::TagOverlap,
        "embedding_similarity" => RelationDetectionMethod::EmbeddingSimilarity,
        "title_overlap" => RelationDetectionMethod::TitleOverlap,
        "code_identifier_reference" => RelationDetectionMethod::CodeIdentifierReference,
        "exact_file_path_match" => RelationDetectionMethod::ExactFilePathMatch,
        _ => RelationDetectionMethod::KeywordMatch,
    }
}

fn parse_timestamp(s: &str) -> rusqlite::Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Strips characters significant to FTS5 query syntax that aren't meant as
/// operators here, preventing a user query from being interpreted as a
/// malformed boolean expression.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(|term| format!("{term}*"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get(4)?;
    let files_json: String = row.get(5)?;
    let last_refreshed: Option<String> = row.get(9)?;
    Ok(Memory {
        id: row.get(0)?,
        memory_type: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        related_files: serde_json::from_str(&files_json).unwrap_or_default(),
        importance: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?)?,
        accessed_at: parse_timestamp(&row.get::<_, String>(8)?)?,
        last_refreshed_at: last_refreshed.map(|s| parse_timestamp(&s)).transpose()?,
        qdrant_id: row.get(10)?,
    })
}

fn parse_code_node_kind(s: &str) -> CodeNodeKind {
    match s {
        "function" => CodeNodeKind::Function,
        "class" => CodeNodeKind::Class,
        "interface" => CodeNodeKind::Interface,
        "type" => CodeNodeKind::Type,
        _ => CodeNodeKind::Module,
    }
}

fn parse_code_edge_kind(s: &str) -> CodeEdgeKind {
    match s {
        "calls" => CodeEdgeKind::Calls,
        "imports" => CodeEdgeKind::Imports,
        "implements" => CodeEdgeKind::Implements,
        "extends" => CodeEdgeKind::Extends,
        _ => CodeEdgeKind::References,
    }
}

fn row_to_code_node(row: &rusqlite::Row) -> rusqlite::Result<CodeNode> {
    let kind_str: String = row.get(1)?;
    let metadata_json: String = row.get(10)?;
    Ok(CodeNode {
        id: row.get(0)?,
        kind: parse_code_node_kind(&kind_str),
        name: row.get(2)?,
        file_path: row.get(3)?,
        start_line: row.get(4)?,
        end_line: row.get(5)?,
        signature: row.get(6)?,
        summary: row.get(7)?,
        summary_confidence: row.get(8)?,
        needs_ai_summary: row.get(9)?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: parse_timestamp(&row.get::<_, String>(11)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(12)?)?,
    })
}

fn row_to_code_edge(row: &rusqlite::Row) -> rusqlite::Result<CodeEdge> {
    let kind_str: String = row.get(3)?;
    let metadata_json: String = row.get(4)?;
    Ok(CodeEdge {
        id: row.get(0)?,
        from_node: row.get(1)?,
        to_node: row.get(2)?,
        edge_type: parse_code_edge_kind(&kind_str),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
    })
}

fn row_to_file_hash(row: &rusqlite::Row) -> rusqlite::Result<FileHash> {
    Ok(FileHash {
        file_path: row.get(0)?,
        hash: row.get(1)?,
        scanned_at: parse_timestamp(&row.get::<_, String>(2)?)?,
    })
}

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        canonical_name: row.get(1)?,
        entity_type: row.get(2)?,
        description: row.get(3)?,
        mention_count: row.get(4)?,
        extraction_confidence: row.get(5)?,
        embedding_id: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(8)?)?,
    })
}

fn row_to_relationship(row: &rusqlite::Row) -> rusqlite::Result<Relationship> {
    Ok(Relationship {
        id: row.get(0)?,
        source_entity_id: row.get(1)?,
        target_entity_id: row.get(2)?,
        relationship_type: row.get(3)?,
        description: row.get(4)?,
        strength: row.get(5)?,
        source_memory_ids: Vec::new(),
        created_at: parse_timestamp(&row.get::<_, String>(6)?)?,
    })
}

fn row_to_community(row: &rusqlite::Row) -> rusqlite::Result<Community> {
    let entity_ids_json: String = row.get(3)?;
    Ok(Community {
        id: row.get(0)?,
        level: row.get(1)?,
        parent_id: row.get(2)?,
        entity_ids: serde_json::from_str(&entity_ids_json).unwrap_or_default(),
        created_at: parse_timestamp(&row.get::<_, String>(4)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(5)?)?,
    })
}

fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<CommunityReport> {
    Ok(CommunityReport {
        id: row.get(0)?,
        community_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        embedding_id: row.get(4)?,
        created_at: parse_timestamp(&row.get::<_, String>(5)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(6)?)?,
    })
}

fn row_to_memory_relation(row: &rusqlite::Row) -> rusqlite::Result<MemoryRelation> {
    let method_str: String = row.get(5)?;
    Ok(MemoryRelation {
        id: row.get(0)?,
        source_memory_id: row.get(1)?,
        target_memory_id: row.get(2)?,
        relation_type: row.get(3)?,
        confidence: row.get(4)?,
        detection_method: parse_detection_method(&method_str),
        auto_applied: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?)?,
    })
}

fn row_to_cross_layer_relation(row: &rusqlite::Row) -> rusqlite::Result<CrossLayerRelation> {
    let method_str: String = row.get(5)?;
    Ok(CrossLayerRelation {
        id: row.get(0)?,
        memory_id: row.get(1)?,
        code_node_id: row.get(2)?,
        relation_type: row.get(3)?,
        confidence: row.get(4)?,
        detection_method: parse_detection_method(&method_str),
        created_at: parse_timestamp(&row.get::<_, String>(6)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> Storage {
        Storage::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_memory() {
        let storage = test_storage();
        let memory = storage
            .create_memory(MemoryInput {
                memory_type: "decision".into(),
                title: "Use PostgreSQL".into(),
                content: "Chose Postgres for ACID guarantees".into(),
                tags: vec!["DB".into(), "db".into()],
                related_files: vec![],
                importance: 0.8,
            })
            .unwrap();
        assert_eq!(memory.tags, vec!["DB".to_string()]);

        let fetched = storage.get_memory(&memory.id).unwrap();
        assert_eq!(fetched.title, "Use PostgreSQL");
        assert_eq!(fetched.qdrant_id, vector_id_for_memory(&memory.id));
    }

    #[test]
    fn test_update_memory_reembed_flag() {
        let storage = test_storage();
        let memory = storage
            .create_memory(MemoryInput {
                title: "A".into(),
                content: "B".into(),
                ..Default::default()
            })
            .unwrap();

        let (_, reembed) = storage
            .update_memory(&memory.id, None, None, Some(vec!["x".into()]), None, None)
            .unwrap();
        assert!(!reembed, "tag-only update should not require re-embedding");

        let (_, reembed) = storage
            .update_memory(
                &memory.id,
                Some("new title".into()),
                None,
                None,
                None,
                None,
            )
            .unwrap();
        assert!(reembed, "title change must trigger re-embedding");
    }

    #[test]
    fn test_delete_memory_cascades_relations() {
        let storage = test_storage();
        let a = storage
            .create_memory(MemoryInput {
                title: "A".into(),
                content: "a".into(),
                ..Default::default()
            })
            .unwrap();
        let b = storage
            .create_memory(MemoryInput {
                title: "B".into(),
                content: "b".into(),
                ..Default::default()
            })
            .unwrap();
        storage
            .upsert_memory_relation(
                &b.id,
                &a.id,
                "supports",
                0.9,
                RelationDetectionMethod::TagOverlap,
                false,
            )
            .unwrap();

        storage.delete_memory(&a.id).unwrap();
        let pending = storage.list_pending_memory_relations().unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn test_code_node_edges_resolve_after_scan() {
        let storage = test_storage();
        let now = Utc::now();
        let caller = CodeNode {
            id: CodeNode::make_id("src/a.rs", CodeNodeKind::Function, "caller"),
            kind: CodeNodeKind::Function,
            name: "caller".into(),
            file_path: "src/a.rs".into(),
            start_line: Some(1),
            end_line: Some(3),
            signature: None,
            summary: None,
            summary_confidence: 0.0,
            needs_ai_summary: true,
            metadata: Default::default(),
            created_at: now,
            updated_at: now,
        };
        let callee = CodeNode {
            id: CodeNode::make_id("src/a.rs", CodeNodeKind::Function, "callee"),
            ..caller.clone()
        };
        let edge = CodeEdge {
            id: CodeEdge::make_id(&caller.id, &callee.id, CodeEdgeKind::Calls),
            from_node: caller.id.clone(),
            to_node: callee.id.clone(),
            edge_type: CodeEdgeKind::Calls,
            metadata: Default::default(),
        };

        storage
            .upsert_code_batch(&[caller.clone(), callee.clone()], &[edge])
            .unwrap();

        assert!(storage.get_code_node(&caller.id).is_ok());
        assert!(storage.get_code_node(&callee.id).is_ok());
        let (outgoing, _) = storage.get_edges_for_node(&caller.id).unwrap();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].to_node, callee.id);
    }

    #[test]
    fn test_entity_merge_fuzzy_match() {
        let storage = test_storage();
        let entity = storage
            .create_entity("postgresql", "PostgreSQL", "TECHNOLOGY", "a database", 0.8)
            .unwrap();

        let found = storage.find_entity_fuzzy("postgres").unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, entity.id);
    }

    #[test]
    fn test_relationship_rejects_self_loop() {
        let storage = test_storage();
        let entity = storage.create_entity("a", "A", "X", "", 0.5).unwrap();
        let result = storage.upsert_relationship(&entity.id, &entity.id, "USES", "", 5.0, "mem1");
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitize_fts5_query_strips_operators() {
        let sanitized = sanitize_fts5_query("postgres OR \"DROP TABLE\" --");
        assert!(!sanitized.contains('"'));
        assert!(!sanitized.contains("--"));
    }
}
