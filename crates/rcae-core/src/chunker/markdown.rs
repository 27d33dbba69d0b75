//! Markdown-aware chunking (§4.3)
//!
//! Splits a markdown document into token-bounded sections along heading and
//! paragraph boundaries, while treating YAML frontmatter and fenced code
//! blocks as atomic — a fence is never split across chunks even if that
//! means a chunk slightly exceeds `max_tokens`.

use super::tokenizer::count_tokens;

/// A chunk of a markdown document, tagged with its heading breadcrumb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownChunk {
    pub heading_path: Vec<String>,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub token_count: usize,
}

/// Token-budget-aware markdown chunker.
pub struct MarkdownChunker {
    max_tokens: usize,
}

impl Default for MarkdownChunker {
    fn default() -> Self {
        Self { max_tokens: 512 }
    }
}

struct RawSection {
    heading_path: Vec<String>,
    content: String,
    start_line: usize,
    end_line: usize,
}

impl MarkdownChunker {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    /// Chunks `content` into heading-scoped, token-bounded sections.
    pub fn chunk(&self, content: &str) -> Vec<MarkdownChunk> {
        let lines: Vec<&str> = content.lines().collect();
        let (frontmatter, body_start) = extract_frontmatter(&lines);
        let sections = self.collect_sections(&lines, body_start, frontmatter);

        sections
            .into_iter()
            .flat_map(|section| self.split_oversized(section))
            .collect()
    }

    fn collect_sections(&self, lines: &[&str], body_start: usize, frontmatter: String) -> Vec<RawSection> {
        let mut heading_stack: Vec<(usize, String)> = Vec::new();
        let mut sections = Vec::new();
        let mut current = frontmatter;
        let mut current_start = body_start + 1;
        let mut in_fence = false;
        let mut fence_marker = "";

        // Returns whether a section was actually emitted, so callers can tell
        // whether `current_start` should advance past the lines just flushed.
        let mut flush = |current: &mut String, start: usize, end: usize, stack: &[(usize, String)]| -> bool {
            let trimmed = current.trim();
            let emitted = !trimmed.is_empty();
            if emitted {
                sections.push(RawSection {
                    heading_path: stack.iter().map(|(_, h)| h.clone()).collect(),
                    content: trimmed.to_string(),
                    start_line: start,
                    end_line: end,
                });
            }
            current.clear();
            emitted
        };

        for (offset, line) in lines[body_start..].iter().enumerate() {
            let line_num = body_start + offset + 1;
            let trimmed_start = line.trim_start();

            if in_fence {
                current.push_str(line);
                current.push('\n');
                if trimmed_start.starts_with(fence_marker) {
                    in_fence = false;
                }
                continue;
            }
            if trimmed_start.starts_with("```") || trimmed_start.starts_with("~~~") {
                in_fence = true;
                fence_marker = if trimmed_start.starts_with("```") { "```" } else { "~~~" };
                if current.is_empty() {
                    current_start = line_num;
                }
                current.push_str(line);
                current.push('\n');
                continue;
            }

            if let Some(level) = heading_level(line) {
                // Flush through the heading line itself (not line_num - 1):
                // otherwise the heading line falls between the flushed
                // section's end and the next section's start and never
                // lands in any chunk's range. Only advance past it if a
                // section was actually emitted — an empty flush means the
                // heading has no preceding content yet, so the lines
                // (including this heading) stay pending for the next
                // non-empty section to claim.
                if flush(&mut current, current_start, line_num, &heading_stack) {
                    current_start = line_num + 1;
                }
                heading_stack.retain(|(l, _)| *l < level);
                heading_stack.push((level, line.trim_start_matches('#').trim().to_string()));
                continue;
            }

            if current.is_empty() {
                current_start = line_num;
            }
            current.push_str(line);
            current.push('\n');
        }
        flush(&mut current, current_start, body_start + lines[body_start..].len(), &heading_stack);

        sections
    }

    fn split_oversized(&self, section: RawSection) -> Vec<MarkdownChunk> {
        let token_count = count_tokens(&section.content);
        if token_count <= self.max_tokens {
            return vec![MarkdownChunk {
                heading_path: section.heading_path,
                content: section.content,
                start_line: section.start_line,
                end_line: section.end_line,
                token_count,
            }];
        }

        // Oversized (e.g. a huge code fence under one heading): fall back to
        // paragraph splits, never slicing inside a fence.
        let mut chunks = Vec::new();
        let mut buf = String::new();
        let mut in_fence = false;
        for para in section.content.split("\n\n") {
            if para.trim_start().starts_with("```") {
                in_fence = !in_fence;
            }
            let candidate = if buf.is_empty() {
                para.to_string()
            } else {
                format!("{buf}\n\n{para}")
            };
            if !in_fence && count_tokens(&candidate) > self.max_tokens && !buf.is_empty() {
                chunks.push(MarkdownChunk {
                    heading_path: section.heading_path.clone(),
                    content: buf.clone(),
                    start_line: section.start_line,
                    end_line: section.end_line,
                    token_count: count_tokens(&buf),
                });
                buf = para.to_string();
            } else {
                buf = candidate;
            }
        }
        if !buf.trim().is_empty() {
            chunks.push(MarkdownChunk {
                heading_path: section.heading_path,
                token_count: count_tokens(&buf),
                content: buf,
                start_line: section.start_line,
                end_line: section.end_line,
            });
        }
        chunks
    }
}

/// Pulls off a leading `--- ... ---` YAML frontmatter block, returning it
/// (with trailing blank line) and the line index the document body starts at.
fn extract_frontmatter(lines: &[&str]) -> (String, usize) {
    if lines.first().map(|l| l.trim() == "---").unwrap_or(false) {
        let mut idx = 1;
        while idx < lines.len() && lines[idx].trim() != "---" {
            idx += 1;
        }
        if idx < lines.len() {
            let frontmatter = format!("{}\n", lines[..=idx].join("\n"));
            return (frontmatter + "\n", idx + 1);
        }
    }
    (String::new(), 0)
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) && trimmed.chars().nth(level) == Some(' ') {
        Some(level)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_respects_headings() {
        let doc = "# Title\n\nIntro text.\n\n## Section One\n\nBody one.\n\n## Section Two\n\nBody two.\n";
        let chunker = MarkdownChunker::new(512);
        let chunks = chunker.chunk(doc);
        assert!(chunks.len() >= 2);
        assert!(chunks.iter().any(|c| c.content.contains("Body one")));
        assert!(chunks.iter().any(|c| c.content.contains("Body two")));
        let section_one = chunks.iter().find(|c| c.content.contains("Body one")).unwrap();
        assert_eq!(section_one.heading_path, vec!["Title".to_string(), "Section One".to_string()]);
    }

    #[test]
    fn test_fenced_code_block_stays_atomic() {
        let doc = "# Title\n\n```rust\nfn f() {\n    // a blank line below\n\n    println!(\"x\");\n}\n```\n";
        let chunker = MarkdownChunker::new(512);
        let chunks = chunker.chunk(doc);
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert!(joined.contains("```rust"));
        assert!(joined.trim_end().ends_with("```"));
    }

    #[test]
    fn test_frontmatter_is_preserved() {
        let doc = "---\ntitle: Example\n---\n\n# Heading\n\nBody.\n";
        let chunker = MarkdownChunker::new(512);
        let chunks = chunker.chunk(doc);
        assert!(chunks[0].content.contains("title: Example"));
    }

    #[test]
    fn test_oversized_section_splits_by_paragraph() {
        let big_para = "word ".repeat(2000);
        let doc = format!("# Title\n\n{big_para}\n\n{big_para}\n");
        let chunker = MarkdownChunker::new(100);
        let chunks = chunker.chunk(&doc);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.token_count <= 100 || chunk.content.contains("```"));
        }
    }
}
