//! Evidence items packed into an assembled context (§4.7 steps 2-4)

use crate::chunker::count_tokens;

/// The section an [`Evidence`] item is budgeted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvidenceSection {
    Memories,
    Code,
    Graph,
    Reports,
}

/// A single retrieved item, already rendered to the text that will be
/// written into the assembled context.
#[derive(Debug, Clone)]
pub struct Evidence {
    pub section: EvidenceSection,
    pub id: String,
    pub title: String,
    pub text: String,
    /// Blended relevance score (§4.7 step 3) used to rank within a section.
    pub score: f32,
    pub tokens: usize,
}

impl Evidence {
    pub fn new(section: EvidenceSection, id: impl Into<String>, title: impl Into<String>, text: impl Into<String>, score: f32) -> Self {
        let text = text.into();
        let tokens = count_tokens(&text);
        Self {
            section,
            id: id.into(),
            title: title.into(),
            text,
            score,
            tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_token_count() {
        let evidence = Evidence::new(EvidenceSection::Memories, "id", "title", "hello world", 1.0);
        assert!(evidence.tokens > 0);
    }
}
