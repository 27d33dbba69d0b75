//! Memory-to-code relation suggestion (§4.8)
//!
//! Links memories to code nodes via exact file-path matches, code
//! identifiers quoted in the memory, and tag/keyword overlap with a node's
//! name or summary.

use crate::model::{CodeNode, CrossLayerRelation, Memory, RelationDetectionMethod};
use crate::storage::{Storage, StorageError};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

fn quoted_identifiers(text: &str) -> HashSet<String> {
    let mut result = HashSet::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c == '`' {
            if let Some(end) = text[start + 1..].find('`') {
                let ident = &text[start + 1..start + 1 + end];
                if !ident.is_empty() {
                    result.insert(ident.to_string());
                }
            }
        }
    }
    result
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Detects relations between memories and code nodes (§4.8).
pub struct CrossLayerDetector {
    storage: Arc<Storage>,
    confidence_threshold: f32,
}

impl CrossLayerDetector {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
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

    /// Scores every memory against every code node and persists relations
    /// clearing the confidence threshold.
    pub fn detect_all(&self) -> Result<Vec<CrossLayerRelation>, StorageError> {
        let memories = self.all_memories()?;
        let nodes = self.storage.all_code_nodes()?;
        let mut created = Vec::new();

        for memory in &memories {
            let identifiers = quoted_identifiers(&memory.content);
            let keywords: HashSet<String> = tokenize(&memory.title)
                .union(&memory.tags.iter().map(|t| t.to_lowercase()).collect())
                .cloned()
                .collect();

            for node in &nodes {
                if let Some(relation) = self.score_node(memory, node, &identifiers, &keywords)? {
                    created.push(relation);
                }
            }
        }
        Ok(created)
    }

    fn score_node(
        &self,
        memory: &Memory,
        node: &CodeNode,
        identifiers: &HashSet<String>,
        keywords: &HashSet<String>,
    ) -> Result<Option<CrossLayerRelation>, StorageError> {
        if memory.related_files.iter().any(|f| f == &node.file_path) {
            return Ok(Some(self.storage.upsert_cross_layer_relation(
                &memory.id,
                &node.id,
                "references",
                1.0,
                RelationDetectionMethod::ExactFilePathMatch,
            )?));
        }
        if identifiers.contains(&node.name) {
            return Ok(Some(self.storage.upsert_cross_layer_relation(
                &memory.id,
                &node.id,
                "references",
                0.9,
                RelationDetectionMethod::CodeIdentifierReference,
            )?));
        }
        let node_tokens: HashSet<String> = tokenize(&node.name);
        let overlap = keywords.intersection(&node_tokens).count();
        if overlap > 0 {
            let confidence = (overlap as f32 / node_tokens.len().max(1) as f32).min(1.0);
            if confidence >= self.confidence_threshold {
                return Ok(Some(self.storage.upsert_cross_layer_relation(
                    &memory.id,
                    &node.id,
                    "mentions",
                    confidence,
                    RelationDetectionMethod::KeywordMatch,
                )?));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodeNodeKind;
    use crate::storage::MemoryInput;
    use chrono::Utc;

    fn node(name: &str, file_path: &str) -> CodeNode {
        CodeNode {
            id: format!("{file_path}:{name}"),
            kind: CodeNodeKind::Function,
            name: name.to_string(),
            file_path: file_path.to_string(),
            start_line: Some(1),
            end_line: Some(10),
            signature: None,
            summary: None,
            summary_confidence: 0.0,
            needs_ai_summary: false,
            metadata: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_detect_all_matches_exact_file_path() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        storage
            .create_memory(MemoryInput {
                memory_type: "note".into(),
                title: "Fixed the parser".into(),
                content: "it was in src/parser.rs".into(),
                tags: Vec::new(),
                related_files: vec!["src/parser.rs".into()],
                importance: 0.5,
            })
            .unwrap();
        storage
            .upsert_code_batch(&[node("parse", "src/parser.rs")], &[])
            .unwrap();

        let detector = CrossLayerDetector::new(storage);
        let relations = detector.detect_all().unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, "references");
    }

    #[test]
    fn test_detect_all_matches_quoted_identifier() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        storage
            .create_memory(MemoryInput {
                memory_type: "note".into(),
                title: "Bug".into(),
                content: "the bug was inside `parse_config`".into(),
                tags: Vec::new(),
                related_files: Vec::new(),
                importance: 0.5,
            })
            .unwrap();
        storage
            .upsert_code_batch(&[node("parse_config", "src/config.rs")], &[])
            .unwrap();

        let detector = CrossLayerDetector::new(storage);
        let relations = detector.detect_all().unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].detection_method, RelationDetectionMethod::CodeIdentifierReference);
    }

    #[test]
    fn test_detect_all_skips_unrelated_node() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        storage
            .create_memory(MemoryInput {
                memory_type: "note".into(),
                title: "Totally unrelated".into(),
                content: "nothing here".into(),
                tags: Vec::new(),
                related_files: Vec::new(),
                importance: 0.5,
            })
            .unwrap();
        storage
            .upsert_code_batch(&[node("zzz_unrelated_fn", "src/zzz.rs")], &[])
            .unwrap();

        let detector = CrossLayerDetector::new(storage);
        let relations = detector.detect_all().unwrap();
        assert!(relations.is_empty());
    }
}
