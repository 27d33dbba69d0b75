//! Token counting and budget enforcement (§4.3)
//!
//! Every size the engine reasons about — chunk size, context budget,
//! per-memory truncation — is measured in cl100k_base tokens, not bytes or
//! characters, so the numbers line up with what the downstream LLM actually
//! sees.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

fn bpe() -> &'static CoreBPE {
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base vocabulary is built in"))
}

/// Token accounting for a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    pub token_count: usize,
    pub char_count: usize,
}

/// Counts the cl100k_base tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    bpe().encode_ordinary(text).len()
}

/// Full token/char accounting for `text`.
pub fn get_token_info(text: &str) -> TokenInfo {
    TokenInfo {
        token_count: count_tokens(text),
        char_count: text.chars().count(),
    }
}

/// `true` when `text` fits within `budget` tokens.
pub fn fits_in_token_budget(text: &str, budget: usize) -> bool {
    count_tokens(text) <= budget
}

/// Truncates `text` to at most `max_tokens` tokens, decoding back to a valid
/// `String` (tiktoken-rs's decoder is lossy at arbitrary token boundaries, so
/// on decode failure this backs off one token at a time).
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let tokens = bpe().encode_ordinary(text);
    if tokens.len() <= max_tokens {
        return text.to_string();
    }
    let mut end = max_tokens;
    loop {
        if end == 0 {
            return String::new();
        }
        if let Ok(decoded) = bpe().decode(tokens[..end].to_vec()) {
            return decoded;
        }
        end -= 1;
    }
}

/// Splits `text` into a sequence of chunks, each at most `max_tokens` tokens,
/// overlapping by `overlap_tokens` so that context isn't lost at a chunk
/// boundary (§4.3 "split_into_token_chunks").
pub fn split_into_token_chunks(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    if max_tokens == 0 {
        return Vec::new();
    }
    let tokens = bpe().encode_ordinary(text);
    if tokens.is_empty() {
        return Vec::new();
    }
    let step = max_tokens.saturating_sub(overlap_tokens).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + max_tokens).min(tokens.len());
        if let Ok(decoded) = bpe().decode(tokens[start..end].to_vec()) {
            chunks.push(decoded);
        }
        if end == tokens.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_nonzero_for_text() {
        assert!(count_tokens("hello, world") > 0);
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn test_fits_in_token_budget() {
        let text = "a short sentence";
        assert!(fits_in_token_budget(text, 100));
        assert!(!fits_in_token_budget(text, 1));
    }

    #[test]
    fn test_truncate_to_tokens_shrinks_count() {
        let text = "one two three four five six seven eight nine ten";
        let truncated = truncate_to_tokens(text, 3);
        assert!(count_tokens(&truncated) <= 3);
        assert!(truncated.len() < text.len());
    }

    #[test]
    fn test_truncate_to_tokens_noop_when_already_short() {
        let text = "short";
        assert_eq!(truncate_to_tokens(text, 1000), text);
    }

    #[test]
    fn test_split_into_token_chunks_overlaps() {
        let text = (0..200)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_into_token_chunks(&text, 50, 10);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(count_tokens(chunk) <= 50);
        }
    }
}
