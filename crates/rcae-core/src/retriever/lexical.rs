//! Cheap lexical overlap scoring (§4.6 seed blend)
//!
//! No FTS5 virtual table is wired up for entities, so the lexical half of
//! the seed blend is a token-overlap score rather than BM25.

use std::collections::HashSet;

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard overlap between the query's tokens and `text`'s tokens, in
/// `[0.0, 1.0]`.
pub fn lexical_overlap(query: &str, text: &str) -> f32 {
    let q = tokenize(query);
    if q.is_empty() {
        return 0.0;
    }
    let t = tokenize(text);
    if t.is_empty() {
        return 0.0;
    }
    let intersection = q.intersection(&t).count();
    let union = q.union(&t).count();
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_overlap_exact_match() {
        assert_eq!(lexical_overlap("Postgres DB", "Postgres DB"), 1.0);
    }

    #[test]
    fn test_lexical_overlap_no_match() {
        assert_eq!(lexical_overlap("Postgres", "completely unrelated text"), 0.0);
    }

    #[test]
    fn test_lexical_overlap_partial_match() {
        let score = lexical_overlap("Postgres connection pool", "Postgres DB");
        assert!(score > 0.0 && score < 1.0);
    }
}
