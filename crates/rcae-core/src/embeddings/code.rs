//! Code-aware embedding preprocessing
//!
//! Strips comments and collapses whitespace before handing source text to
//! the general embedding model, so a chunk's embedding is driven by its
//! identifiers and structure rather than formatting. Chunk boundaries
//! themselves come from [`crate::chunker::chunk_by_nodes`], which aligns to
//! the code graph rather than line heuristics.

use super::local::{Embedding, EmbeddingError, EmbeddingService};

// ============================================================================
// CODE EMBEDDING
// ============================================================================

/// Code-aware embedding generator
pub struct CodeEmbedding {
    /// General embedding service (fallback)
    service: EmbeddingService,
}

impl Default for CodeEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeEmbedding {
    /// Create a new code embedding generator
    pub fn new() -> Self {
        Self {
            service: EmbeddingService::new(),
        }
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        self.service.is_ready()
    }

    /// Initialize the embedding model
    pub fn init(&self) -> Result<(), EmbeddingError> {
        self.service.init()
    }

    /// Generate embedding for code
    ///
    /// Currently uses the general embedding model with code preprocessing.
    /// Future: Use code-specific models like CodeBERT.
    pub fn embed_code(
        &self,
        code: &str,
        language: Option<&str>,
    ) -> Result<Embedding, EmbeddingError> {
        // Preprocess code for better embedding
        let processed = self.preprocess_code(code, language);
        self.service.embed(&processed)
    }

    /// Preprocess code for embedding
    fn preprocess_code(&self, code: &str, language: Option<&str>) -> String {
        let mut result = String::new();

        // Add language hint if available
        if let Some(lang) = language {
            result.push_str(&format!("[{}] ", lang.to_uppercase()));
        }

        // Clean and normalize code
        let cleaned = self.clean_code(code);
        result.push_str(&cleaned);

        result
    }

    /// Clean code by removing excessive whitespace and normalizing
    fn clean_code(&self, code: &str) -> String {
        let lines: Vec<&str> = code
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .filter(|l| !self.is_comment_only(l))
            .collect();

        lines.join(" ")
    }

    /// Check if a line is only a comment
    fn is_comment_only(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.starts_with("//")
            || trimmed.starts_with('#')
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_embedding_creation() {
        let ce = CodeEmbedding::new();
        let _ = ce.is_ready();
    }

    #[test]
    fn test_clean_code() {
        let ce = CodeEmbedding::new();
        let code = r#"
            // This is a comment
            fn hello() {
                println!("Hello");
            }
        "#;

        let cleaned = ce.clean_code(code);
        assert!(!cleaned.contains("// This is a comment"));
        assert!(cleaned.contains("fn hello()"));
    }

    #[test]
    fn test_preprocess_code_adds_language_hint() {
        let ce = CodeEmbedding::new();
        let processed = ce.preprocess_code("fn hello() {}", Some("rust"));
        assert!(processed.starts_with("[RUST] "));
    }
}
