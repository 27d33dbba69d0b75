//! Chunking and tokenization (§4.3)
//!
//! Token-aware splitting of both markdown notes and source code, all
//! measured against the same cl100k_base tokenizer the context assembler
//! budgets against.

mod code;
mod markdown;
mod tokenizer;

pub use code::{chunk_by_nodes, CodeChunk};
pub use markdown::{MarkdownChunk, MarkdownChunker};
pub use tokenizer::{
    count_tokens, fits_in_token_budget, get_token_info, split_into_token_chunks,
    truncate_to_tokens, TokenInfo,
};
