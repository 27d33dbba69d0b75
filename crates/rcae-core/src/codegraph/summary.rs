//! Heuristic node summaries (§4.2 step 5)
//!
//! No LLM call happens here. A summary is either a leading doc-comment block,
//! a leading plain comment block, or — failing both — a stub derived from
//! the signature. Each strategy carries a fixed confidence; nodes below
//! [`SUMMARY_CONFIDENCE_THRESHOLD`] or that look like part of the file's
//! public surface are flagged `needs_ai_summary` for a higher-quality pass
//! elsewhere in the pipeline.

use crate::model::CodeNode;

pub const SUMMARY_CONFIDENCE_THRESHOLD: f32 = 0.8;

const DOC_COMMENT_CONFIDENCE: f32 = 0.9;
const PLAIN_COMMENT_CONFIDENCE: f32 = 0.6;
const SIGNATURE_STUB_CONFIDENCE: f32 = 0.3;

/// True if a comment line prefix for any supported language's line-comment
/// or doc-comment syntax.
fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///")
        || trimmed.starts_with("//!")
        || trimmed.starts_with("//")
        || trimmed.starts_with('#')
        || trimmed.starts_with('*')
        || trimmed.starts_with("/*")
}

fn strip_comment_markers(line: &str) -> String {
    line.trim()
        .trim_start_matches("///")
        .trim_start_matches("//!")
        .trim_start_matches("//")
        .trim_start_matches("/**")
        .trim_start_matches("/*")
        .trim_start_matches('*')
        .trim_start_matches('#')
        .trim_end_matches("*/")
        .trim()
        .to_string()
}

/// Scans the file's lines immediately above `start_line` (1-indexed,
/// exclusive) for a contiguous comment block, reading upward and then
/// reversing to source order. Returns the joined text and whether the block
/// used doc-comment syntax (`///`, `//!`) rather than a plain comment.
fn leading_comment(lines: &[&str], start_line: u32) -> Option<(String, bool)> {
    if start_line < 2 {
        return None;
    }
    let mut collected = Vec::new();
    let mut is_doc = true;
    let mut idx = start_line as usize - 1;
    while idx > 0 {
        let line = lines[idx - 1];
        if line.trim().is_empty() {
            break;
        }
        if !is_comment_line(line) {
            break;
        }
        let trimmed = line.trim_start();
        if !(trimmed.starts_with("///") || trimmed.starts_with("//!")) {
            is_doc = false;
        }
        collected.push(strip_comment_markers(line));
        idx -= 1;
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    let text = collected.join(" ").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some((text, is_doc))
    }
}

/// Python/triple-quoted docstring as the body's first statement. Looks for
/// `"""` or `'''` within the first few lines after `start_line`.
fn python_docstring(lines: &[&str], start_line: u32, end_line: u32) -> Option<String> {
    let begin = start_line as usize;
    let end = (end_line as usize).min(lines.len());
    for line in lines.get(begin..end.min(begin + 4))? {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("\"\"\"") {
            let body = rest.trim_end_matches("\"\"\"").trim();
            if !body.is_empty() {
                return Some(body.to_string());
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("'''") {
            let body = rest.trim_end_matches("'''").trim();
            if !body.is_empty() {
                return Some(body.to_string());
            }
        }
    }
    None
}

fn signature_stub(node: &CodeNode) -> String {
    match &node.signature {
        Some(sig) if !sig.is_empty() => format!("{} {}", node.kind.as_str(), sig),
        _ => format!("{} {}", node.kind.as_str(), node.name),
    }
}

/// A symbol is treated as part of the file's public surface if its
/// signature mentions a visibility keyword or, absent any visibility
/// syntax in the language, its name doesn't start with an underscore.
fn looks_exported(node: &CodeNode) -> bool {
    let sig = node.signature.as_deref().unwrap_or_default();
    if sig.contains("pub ") || sig.contains("pub(") || sig.contains("export ") {
        return true;
    }
    if sig.contains("private ") {
        return false;
    }
    !node.name.starts_with('_')
}

/// Fills in `summary`, `summary_confidence`, and `needs_ai_summary` on
/// `node` from `file_content`'s surrounding lines.
pub fn summarize(node: &mut CodeNode, file_content: &str) {
    let lines: Vec<&str> = file_content.lines().collect();
    let start = node.start_line.unwrap_or(1);
    let end = node.end_line.unwrap_or(start);

    let (summary, confidence) = if let Some((text, is_doc)) = leading_comment(&lines, start) {
        (text, if is_doc { DOC_COMMENT_CONFIDENCE } else { PLAIN_COMMENT_CONFIDENCE })
    } else if let Some(doc) = python_docstring(&lines, start, end) {
        (doc, DOC_COMMENT_CONFIDENCE)
    } else {
        (signature_stub(node), SIGNATURE_STUB_CONFIDENCE)
    };

    node.summary = Some(summary);
    node.summary_confidence = confidence;
    node.needs_ai_summary = confidence < SUMMARY_CONFIDENCE_THRESHOLD || looks_exported(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodeNodeKind;
    use chrono::Utc;

    fn bare_node(name: &str, signature: Option<&str>, start: u32, end: u32) -> CodeNode {
        let now = Utc::now();
        CodeNode {
            id: CodeNode::make_id("a.rs", CodeNodeKind::Function, name),
            kind: CodeNodeKind::Function,
            name: name.to_string(),
            file_path: "a.rs".into(),
            start_line: Some(start),
            end_line: Some(end),
            signature: signature.map(str::to_string),
            summary: None,
            summary_confidence: 0.0,
            needs_ai_summary: true,
            metadata: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_summarize_uses_leading_doc_comment() {
        let content = "/// Adds two numbers.\npub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
        let mut node = bare_node("add", Some("pub fn add(a: i32, b: i32) -> i32 {"), 2, 4);
        summarize(&mut node, content);
        assert_eq!(node.summary.as_deref(), Some("Adds two numbers."));
        // exported (pub fn) so flagged for a higher-quality pass despite good confidence
        assert!(node.needs_ai_summary);
    }

    #[test]
    fn test_summarize_falls_back_to_signature_stub() {
        let content = "fn helper() {\n    1\n}\n";
        let mut node = bare_node("helper", Some("fn helper() {"), 1, 3);
        summarize(&mut node, content);
        assert!(node.summary.unwrap().contains("helper"));
        assert!(node.summary_confidence < SUMMARY_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_private_non_exported_with_good_confidence_does_not_need_ai_summary() {
        let content = "// internal helper\nfn _scratch() {\n    1\n}\n";
        let mut node = bare_node("_scratch", Some("fn _scratch() {"), 2, 4);
        summarize(&mut node, content);
        assert!(!node.needs_ai_summary);
    }
}
