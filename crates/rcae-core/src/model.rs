//! Shared data model
//!
//! Every entity the engine persists or indexes: memories, code symbols, the
//! GraphRAG entity/community graph, and the vector payload tag shared by
//! everything written into the vector store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

// ============================================================================
// MEMORY
// ============================================================================

/// Types of memory notes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Decision,
    Solution,
    Pattern,
    Architecture,
    #[default]
    Note,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Decision => "decision",
            MemoryType::Solution => "solution",
            MemoryType::Pattern => "pattern",
            MemoryType::Architecture => "architecture",
            MemoryType::Note => "note",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "decision" => MemoryType::Decision,
            "solution" => MemoryType::Solution,
            "pattern" => MemoryType::Pattern,
            "architecture" => MemoryType::Architecture,
            _ => MemoryType::Note,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user/agent-authored note (§3 Memory).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub memory_type: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub related_files: Vec<String>,
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Deterministic vector handle; see [`vector_id_for_memory`].
    pub qdrant_id: String,
}

/// Deterministic vector id for a memory, so re-ingesting the same id always
/// upserts the same vector record instead of leaking orphans.
pub fn vector_id_for_memory(memory_id: &str) -> String {
    format!("memory:{memory_id}")
}

/// Input for creating a new memory.
///
/// `deny_unknown_fields` rejects unexpected JSON keys instead of silently
/// dropping them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryInput {
    pub memory_type: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_files: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f64,
}

fn default_importance() -> f64 {
    0.5
}

impl Default for MemoryInput {
    fn default() -> Self {
        Self {
            memory_type: MemoryType::Note.as_str().to_string(),
            title: String::new(),
            content: String::new(),
            tags: Vec::new(),
            related_files: Vec::new(),
            importance: default_importance(),
        }
    }
}

// ============================================================================
// CODE GRAPH
// ============================================================================

/// Kind of a code symbol or file-level node.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeNodeKind {
    Function,
    Class,
    Interface,
    Type,
    Module,
}

impl CodeNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeNodeKind::Function => "function",
            CodeNodeKind::Class => "class",
            CodeNodeKind::Interface => "interface",
            CodeNodeKind::Type => "type",
            CodeNodeKind::Module => "module",
        }
    }
}

impl std::fmt::Display for CodeNodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A symbol or file-module in the repository (§3 CodeNode).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeNode {
    /// `"<relPath>:<kind>:<name>"`, unique within the project.
    pub id: String,
    pub kind: CodeNodeKind,
    pub name: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Confidence of the generated summary, 0.0 if none was generated.
    #[serde(default)]
    pub summary_confidence: f32,
    #[serde(default)]
    pub needs_ai_summary: bool,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeNode {
    /// Builds the canonical id for a symbol at a given path.
    pub fn make_id(rel_path: &str, kind: CodeNodeKind, name: &str) -> String {
        format!("{rel_path}:{kind}:{name}")
    }
}

/// Kind of static relation between two code nodes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeEdgeKind {
    Calls,
    Imports,
    Implements,
    Extends,
    References,
}

impl CodeEdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeEdgeKind::Calls => "calls",
            CodeEdgeKind::Imports => "imports",
            CodeEdgeKind::Implements => "implements",
            CodeEdgeKind::Extends => "extends",
            CodeEdgeKind::References => "references",
        }
    }
}

/// A directed relation between two code nodes (§3 CodeEdge).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEdge {
    pub id: String,
    pub from_node: String,
    pub to_node: String,
    pub edge_type: CodeEdgeKind,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

impl CodeEdge {
    /// Deterministic id from the (from, to, type) triple so upserts collapse
    /// duplicates the way the storage layer's unique index requires.
    pub fn make_id(from_node: &str, to_node: &str, edge_type: CodeEdgeKind) -> String {
        let mut hasher = DefaultHasher::new();
        from_node.hash(&mut hasher);
        to_node.hash(&mut hasher);
        edge_type.as_str().hash(&mut hasher);
        format!("edge:{:016x}", hasher.finish())
    }
}

/// Content fingerprint keyed by path, for incremental scan delta detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHash {
    pub file_path: String,
    pub hash: String,
    pub scanned_at: DateTime<Utc>,
}

// ============================================================================
// ENTITY / COMMUNITY GRAPH (GraphRAG)
// ============================================================================

/// A canonicalized named thing extracted from memory content.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub canonical_name: String,
    /// Open set, conventionally uppercased (e.g. `PERSON`, `SERVICE`).
    pub entity_type: String,
    pub description: String,
    pub mention_count: u32,
    pub extraction_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A weighted directed edge between two entities.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    /// Open set, conventionally uppercased (e.g. `USES`, `DEPENDS_ON`).
    pub relationship_type: String,
    pub description: String,
    /// `[1, 10]`.
    pub strength: f32,
    pub source_memory_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn make_id(source_entity_id: &str, target_entity_id: &str, relationship_type: &str) -> String {
        let mut hasher = DefaultHasher::new();
        source_entity_id.hash(&mut hasher);
        target_entity_id.hash(&mut hasher);
        relationship_type.hash(&mut hasher);
        format!("rel:{:016x}", hasher.finish())
    }
}

/// A cluster of entities at some hierarchy level.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub entity_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A synthesized title + summary + embedding for a community.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityReport {
    pub id: String,
    pub community_id: String,
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// CROSS-STORE RELATIONS
// ============================================================================

/// How a memory-memory or memory-code relation was discovered (§4.8).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationDetectionMethod {
    SharedFiles,
    TemporalProximity,
    TagOverlap,
    EmbeddingSimilarity,
    TitleOverlap,
    CodeIdentifierReference,
    ExactFilePathMatch,
    KeywordMatch,
}

/// A typed directed edge between two memories.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRelation {
    pub id: String,
    pub source_memory_id: String,
    pub target_memory_id: String,
    /// e.g. `causes`, `implements`, `supports`, `supersedes`.
    pub relation_type: String,
    pub confidence: f32,
    pub detection_method: RelationDetectionMethod,
    pub auto_applied: bool,
    pub created_at: DateTime<Utc>,
}

/// A typed directed edge between a memory and a code node.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossLayerRelation {
    pub id: String,
    pub memory_id: String,
    pub code_node_id: String,
    pub relation_type: String,
    pub confidence: f32,
    pub detection_method: RelationDetectionMethod,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// VECTOR PAYLOAD
// ============================================================================

/// The tagged payload stored alongside every vector (§9 duck-typed-payload
/// re-architecture pattern: a fixed set of kind discriminators rather than an
/// open map).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VectorPayload {
    Memory {
        memory_id: String,
        title: String,
        tags: Vec<String>,
        related_files: Vec<String>,
        importance: f64,
    },
    CodeUnit {
        node_id: String,
        file_path: String,
        name: String,
    },
    GraphragEntity {
        entity_id: String,
        canonical_name: String,
        entity_type: String,
    },
    GraphragReport {
        report_id: String,
        community_id: String,
        title: String,
    },
    /// Unknown kinds are dropped during deserialization rather than causing
    /// the whole record to fail (the duck-typed-payload pattern's edge case).
    #[serde(other)]
    Unknown,
}

impl VectorPayload {
    pub fn type_tag(&self) -> &'static str {
        match self {
            VectorPayload::Memory { .. } => "memory",
            VectorPayload::CodeUnit { .. } => "code_unit",
            VectorPayload::GraphragEntity { .. } => "graphrag_entity",
            VectorPayload::GraphragReport { .. } => "graphrag_report",
            VectorPayload::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_type_roundtrip() {
        for t in [
            MemoryType::Decision,
            MemoryType::Solution,
            MemoryType::Pattern,
            MemoryType::Architecture,
            MemoryType::Note,
        ] {
            assert_eq!(MemoryType::parse_name(t.as_str()), t);
        }
    }

    #[test]
    fn test_code_node_id_is_stable() {
        let id1 = CodeNode::make_id("src/auth.ts", CodeNodeKind::Function, "authenticate");
        let id2 = CodeNode::make_id("src/auth.ts", CodeNodeKind::Function, "authenticate");
        assert_eq!(id1, id2);
        assert_eq!(id1, "src/auth.ts:function:authenticate");
    }

    #[test]
    fn test_code_edge_id_deterministic() {
        let id1 = CodeEdge::make_id("a", "b", CodeEdgeKind::Calls);
        let id2 = CodeEdge::make_id("a", "b", CodeEdgeKind::Calls);
        let id3 = CodeEdge::make_id("b", "a", CodeEdgeKind::Calls);
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_relationship_id_order_sensitive() {
        let forward = Relationship::make_id("e1", "e2", "USES");
        let backward = Relationship::make_id("e2", "e1", "USES");
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_vector_payload_unknown_kind_is_dropped_safely() {
        let json = serde_json::json!({ "kind": "something_new", "extra": 1 });
        let payload: VectorPayload = serde_json::from_value(json).unwrap();
        assert!(matches!(payload, VectorPayload::Unknown));
    }

    #[test]
    fn test_memory_input_deny_unknown_fields() {
        let json = r#"{"memoryType":"decision","title":"t","content":"c"}"#;
        let parsed: Result<MemoryInput, _> = serde_json::from_str(json);
        assert!(parsed.is_ok());

        let json_bad =
            r#"{"memoryType":"decision","title":"t","content":"c","unexpected":"x"}"#;
        let parsed_bad: Result<MemoryInput, _> = serde_json::from_str(json_bad);
        assert!(parsed_bad.is_err());
    }

    #[test]
    fn test_vector_id_for_memory_is_deterministic() {
        assert_eq!(vector_id_for_memory("abc"), vector_id_for_memory("abc"));
        assert_ne!(vector_id_for_memory("abc"), vector_id_for_memory("def"));
    }
}
