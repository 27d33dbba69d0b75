//! Database migrations
//!
//! Schema evolves through a linear, versioned migration log. Each entry
//! carries both the forward SQL and the SQL that reverses it, so a bad
//! deploy can be rolled back without a manual hotfix. Forward SQL is
//! idempotent (`IF NOT EXISTS`) and non-destructive.

/// A single schema migration with both directions.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Memories, code graph, and file hash tables",
        up: MIGRATION_V1_UP,
        down: MIGRATION_V1_DOWN,
    },
    Migration {
        version: 2,
        description: "GraphRAG entity/relationship/community/report tables",
        up: MIGRATION_V2_UP,
        down: MIGRATION_V2_DOWN,
    },
    Migration {
        version: 3,
        description: "Memory-memory and cross-layer relation suggestion tables",
        up: MIGRATION_V3_UP,
        down: MIGRATION_V3_DOWN,
    },
    Migration {
        version: 4,
        description: "FTS5 full-text index over memories and code nodes",
        up: MIGRATION_V4_UP,
        down: MIGRATION_V4_DOWN,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    memory_type TEXT NOT NULL DEFAULT 'note',
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    related_files TEXT NOT NULL DEFAULT '[]',
    importance REAL NOT NULL DEFAULT 0.5,
    created_at TEXT NOT NULL,
    accessed_at TEXT NOT NULL,
    last_refreshed_at TEXT,
    qdrant_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

CREATE TABLE IF NOT EXISTS code_nodes (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    start_line INTEGER,
    end_line INTEGER,
    signature TEXT,
    summary TEXT,
    summary_confidence REAL NOT NULL DEFAULT 0.0,
    needs_ai_summary INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_code_nodes_file ON code_nodes(file_path);
CREATE INDEX IF NOT EXISTS idx_code_nodes_kind ON code_nodes(kind);
CREATE INDEX IF NOT EXISTS idx_code_nodes_needs_summary ON code_nodes(needs_ai_summary);

CREATE TABLE IF NOT EXISTS code_edges (
    id TEXT PRIMARY KEY,
    from_node TEXT NOT NULL REFERENCES code_nodes(id) ON DELETE CASCADE,
    to_node TEXT NOT NULL REFERENCES code_nodes(id) ON DELETE CASCADE,
    edge_type TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    UNIQUE(from_node, to_node, edge_type)
);

CREATE INDEX IF NOT EXISTS idx_code_edges_from ON code_edges(from_node);
CREATE INDEX IF NOT EXISTS idx_code_edges_to ON code_edges(to_node);

CREATE TABLE IF NOT EXISTS file_hashes (
    file_path TEXT PRIMARY KEY,
    hash TEXT NOT NULL,
    scanned_at TEXT NOT NULL
);

INSERT INTO schema_version (version) VALUES (1);
"#;

const MIGRATION_V1_DOWN: &str = r#"
DROP TABLE IF EXISTS file_hashes;
DROP TABLE IF EXISTS code_edges;
DROP TABLE IF EXISTS code_nodes;
DROP TABLE IF EXISTS memories;
DELETE FROM schema_version WHERE version = 1;
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    canonical_name TEXT NOT NULL,
    alias_key TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    mention_count INTEGER NOT NULL DEFAULT 0,
    extraction_confidence REAL NOT NULL DEFAULT 0.0,
    embedding_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_entities_alias_key ON entities(alias_key);

CREATE TABLE IF NOT EXISTS entity_memory_links (
    entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    mention_text TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (entity_id, memory_id)
);

CREATE INDEX IF NOT EXISTS idx_entity_memory_links_memory ON entity_memory_links(memory_id);

CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    source_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    target_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    relationship_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    strength REAL NOT NULL DEFAULT 1.0,
    created_at TEXT NOT NULL,
    UNIQUE(source_entity_id, target_entity_id, relationship_type)
);

CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_entity_id);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_entity_id);

CREATE TABLE IF NOT EXISTS relationship_memory_links (
    relationship_id TEXT NOT NULL REFERENCES relationships(id) ON DELETE CASCADE,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    description TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (relationship_id, memory_id)
);

CREATE TABLE IF NOT EXISTS communities (
    id TEXT PRIMARY KEY,
    level INTEGER NOT NULL,
    parent_id TEXT REFERENCES communities(id) ON DELETE SET NULL,
    entity_ids TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_communities_level ON communities(level);
CREATE INDEX IF NOT EXISTS idx_communities_parent ON communities(parent_id);

CREATE TABLE IF NOT EXISTS community_reports (
    id TEXT PRIMARY KEY,
    community_id TEXT NOT NULL REFERENCES communities(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    embedding_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_community_reports_community ON community_reports(community_id);

UPDATE schema_version SET version = 2, applied_at = datetime('now');
INSERT INTO schema_version (version) SELECT 2 WHERE NOT EXISTS (SELECT 1 FROM schema_version WHERE version = 2);
"#;

const MIGRATION_V2_DOWN: &str = r#"
DROP TABLE IF EXISTS community_reports;
DROP TABLE IF EXISTS communities;
DROP TABLE IF EXISTS relationship_memory_links;
DROP TABLE IF EXISTS relationships;
DROP TABLE IF EXISTS entity_memory_links;
DROP TABLE IF EXISTS entities;
DELETE FROM schema_version WHERE version = 2;
"#;

const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memory_relations (
    id TEXT PRIMARY KEY,
    source_memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    target_memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.0,
    detection_method TEXT NOT NULL,
    auto_applied INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE(source_memory_id, target_memory_id, detection_method)
);

CREATE INDEX IF NOT EXISTS idx_memory_relations_source ON memory_relations(source_memory_id);
CREATE INDEX IF NOT EXISTS idx_memory_relations_target ON memory_relations(target_memory_id);

CREATE TABLE IF NOT EXISTS cross_layer_relations (
    id TEXT PRIMARY KEY,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    code_node_id TEXT NOT NULL REFERENCES code_nodes(id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.0,
    detection_method TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(memory_id, code_node_id, detection_method)
);

CREATE INDEX IF NOT EXISTS idx_cross_layer_memory ON cross_layer_relations(memory_id);
CREATE INDEX IF NOT EXISTS idx_cross_layer_code_node ON cross_layer_relations(code_node_id);

UPDATE schema_version SET version = 3, applied_at = datetime('now');
INSERT INTO schema_version (version) SELECT 3 WHERE NOT EXISTS (SELECT 1 FROM schema_version WHERE version = 3);
"#;

const MIGRATION_V3_DOWN: &str = r#"
DROP TABLE IF EXISTS cross_layer_relations;
DROP TABLE IF EXISTS memory_relations;
DELETE FROM schema_version WHERE version = 3;
"#;

const MIGRATION_V4_UP: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    id UNINDEXED,
    title,
    content,
    tags,
    tokenize = 'porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(id, title, content, tags) VALUES (new.id, new.title, new.content, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_update AFTER UPDATE ON memories BEGIN
    DELETE FROM memories_fts WHERE id = old.id;
    INSERT INTO memories_fts(id, title, content, tags) VALUES (new.id, new.title, new.content, new.tags);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_delete AFTER DELETE ON memories BEGIN
    DELETE FROM memories_fts WHERE id = old.id;
END;

CREATE VIRTUAL TABLE IF NOT EXISTS code_nodes_fts USING fts5(
    id UNINDEXED,
    name,
    signature,
    summary,
    tokenize = 'porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS code_nodes_fts_insert AFTER INSERT ON code_nodes BEGIN
    INSERT INTO code_nodes_fts(id, name, signature, summary)
    VALUES (new.id, new.name, coalesce(new.signature, ''), coalesce(new.summary, ''));
END;

CREATE TRIGGER IF NOT EXISTS code_nodes_fts_update AFTER UPDATE ON code_nodes BEGIN
    DELETE FROM code_nodes_fts WHERE id = old.id;
    INSERT INTO code_nodes_fts(id, name, signature, summary)
    VALUES (new.id, new.name, coalesce(new.signature, ''), coalesce(new.summary, ''));
END;

CREATE TRIGGER IF NOT EXISTS code_nodes_fts_delete AFTER DELETE ON code_nodes BEGIN
    DELETE FROM code_nodes_fts WHERE id = old.id;
END;

UPDATE schema_version SET version = 4, applied_at = datetime('now');
INSERT INTO schema_version (version) SELECT 4 WHERE NOT EXISTS (SELECT 1 FROM schema_version WHERE version = 4);
"#;

const MIGRATION_V4_DOWN: &str = r#"
DROP TRIGGER IF EXISTS code_nodes_fts_delete;
DROP TRIGGER IF EXISTS code_nodes_fts_update;
DROP TRIGGER IF EXISTS code_nodes_fts_insert;
DROP TABLE IF EXISTS code_nodes_fts;
DROP TRIGGER IF EXISTS memories_fts_delete;
DROP TRIGGER IF EXISTS memories_fts_update;
DROP TRIGGER IF EXISTS memories_fts_insert;
DROP TABLE IF EXISTS memories_fts;
DELETE FROM schema_version WHERE version = 4;
"#;

/// Current schema version, or 0 for a fresh database.
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Applies every migration newer than the current version, in order.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applying migration"
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

/// Reverts migrations down to (and including) `target_version + 1`, applying
/// each migration's `down` script in reverse order. Used by the restore/CLI
/// tooling, never by normal startup.
pub fn revert_to(conn: &rusqlite::Connection, target_version: u32) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut reverted = 0;

    for migration in MIGRATIONS.iter().rev() {
        if migration.version <= current_version && migration.version > target_version {
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "reverting migration"
            );
            conn.execute_batch(migration.down)?;
            reverted += 1;
        }
    }

    Ok(reverted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_apply_migrations_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        let applied = apply_migrations(&conn).unwrap();
        assert_eq!(applied, MIGRATIONS.len() as u32);
        assert_eq!(get_current_version(&conn).unwrap(), 4);
    }

    #[test]
    fn test_apply_migrations_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let second_pass = apply_migrations(&conn).unwrap();
        assert_eq!(second_pass, 0);
    }

    #[test]
    fn test_revert_to_zero_drops_everything() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let reverted = revert_to(&conn, 0).unwrap();
        assert_eq!(reverted, MIGRATIONS.len() as u32);
        assert_eq!(get_current_version(&conn).unwrap(), 0);

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 0);
    }

    #[test]
    fn test_revert_partial_then_reapply() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        revert_to(&conn, 2).unwrap();
        assert_eq!(get_current_version(&conn).unwrap(), 2);
        let reapplied = apply_migrations(&conn).unwrap();
        assert_eq!(reapplied, 2);
        assert_eq!(get_current_version(&conn).unwrap(), 4);
    }
}
