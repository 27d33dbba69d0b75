//! Code-graph-aligned chunking (§4.3)
//!
//! Unlike markdown chunking, code is never split at arbitrary token
//! boundaries — each chunk corresponds exactly to one [`crate::model::CodeNode`]
//! span, so the chunk a retriever hands back is always a complete function,
//! class, or module, regardless of how many tokens it costs.

use super::tokenizer::count_tokens;
use crate::model::CodeNode;

/// One chunk of source text bound to the code-graph node it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    pub node_id: String,
    pub file_path: String,
    pub content: String,
    pub token_count: usize,
}

/// Slices `file_content` into one [`CodeChunk`] per node whose span falls
/// inside that file, using 1-indexed inclusive `start_line..=end_line`.
pub fn chunk_by_nodes(file_content: &str, nodes: &[CodeNode]) -> Vec<CodeChunk> {
    let lines: Vec<&str> = file_content.lines().collect();
    nodes
        .iter()
        .filter_map(|node| {
            let start = node.start_line?;
            let end = node.end_line.unwrap_or(start);
            if start == 0 || start as usize > lines.len() {
                return None;
            }
            let start_idx = (start as usize) - 1;
            let end_idx = (end as usize).min(lines.len());
            let content = lines[start_idx..end_idx].join("\n");
            let token_count = count_tokens(&content);
            Some(CodeChunk {
                node_id: node.id.clone(),
                file_path: node.file_path.clone(),
                content,
                token_count,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodeNodeKind;
    use chrono::Utc;

    fn node(start: u32, end: u32) -> CodeNode {
        let now = Utc::now();
        CodeNode {
            id: CodeNode::make_id("a.rs", CodeNodeKind::Function, "f"),
            kind: CodeNodeKind::Function,
            name: "f".into(),
            file_path: "a.rs".into(),
            start_line: Some(start),
            end_line: Some(end),
            signature: None,
            summary: None,
            summary_confidence: 0.0,
            needs_ai_summary: true,
            metadata: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_chunk_by_nodes_slices_exact_span() {
        let content = "line1\nline2\nline3\nline4\nline5\n";
        let nodes = vec![node(2, 4)];
        let chunks = chunk_by_nodes(content, &nodes);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "line2\nline3\nline4");
    }

    #[test]
    fn test_chunk_by_nodes_skips_out_of_range() {
        let content = "line1\nline2\n";
        let nodes = vec![node(10, 12)];
        let chunks = chunk_by_nodes(content, &nodes);
        assert!(chunks.is_empty());
    }
}
