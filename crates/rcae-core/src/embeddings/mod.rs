//! Local embedding generation (§4.4)
//!
//! Generates vectors with fastembed (ONNX, runs in-process) so the engine
//! never makes an external API call. Vectors are Matryoshka-truncated to
//! [`crate::EMBEDDING_DIMENSIONS`] before they ever reach the vector index.

mod code;
mod local;

pub use local::{
    cosine_similarity, dot_product, euclidean_distance, matryoshka_truncate, Embedding,
    EmbeddingError, EmbeddingService, BATCH_SIZE, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};

pub use code::CodeEmbedding;
