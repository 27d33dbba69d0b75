//! # RCAE Core
//!
//! The retrieval & context assembly engine: a project-local knowledge engine
//! that builds a symbolic code graph, a semantic vector index over code and
//! notes, and a community-clustered entity graph from notes, then fuses all
//! three at query time into a token-bounded context pack.
//!
//! ## Subsystems
//!
//! - [`storage`] — the embedded SQLite store, schema migrations, typed CRUD.
//! - [`model`] — the shared data model (`Memory`, `CodeNode`, `Entity`, …).
//! - [`codegraph`] — file discovery, hashing, incremental symbol indexing.
//! - [`chunker`] — token-aware markdown and code chunking.
//! - [`embeddings`] — local embedding generation (fastembed, when enabled).
//! - [`search`] — the vector index and reciprocal-rank-fusion primitives.
//! - [`graphrag`] — entity extraction, merging, community detection, reports.
//! - [`retriever`] — local/global/drift hybrid search.
//! - [`assembler`] — budgeted context packing with evidence provenance.
//! - [`relations`] — memory-memory and memory-code relation suggestion.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rcae_core::{Storage, MemoryInput};
//!
//! let storage = Storage::open_default()?;
//! let memory = storage.create_memory(MemoryInput {
//!     memory_type: "decision".into(),
//!     title: "Use PostgreSQL".into(),
//!     content: "Chose Postgres for ACID guarantees".into(),
//!     ..Default::default()
//! })?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod assembler;
pub mod capability;
pub mod chunker;
pub mod config;
pub mod graphrag;
pub mod model;
pub mod relations;
pub mod retriever;
pub mod storage;

#[cfg(feature = "codegraph")]
#[cfg_attr(docsrs, doc(cfg(feature = "codegraph")))]
pub mod codegraph;

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub mod embeddings;

#[cfg(feature = "vector-search")]
#[cfg_attr(docsrs, doc(cfg(feature = "vector-search")))]
pub mod search;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use model::{
    CodeEdge, CodeEdgeKind, CodeNode, CodeNodeKind, Community, CommunityReport,
    CrossLayerRelation, Entity, FileHash, Memory, MemoryRelation, MemoryType,
    RelationDetectionMethod, Relationship, VectorPayload,
};

pub use storage::{MemoryInput, Storage, StorageError};

pub use chunker::{
    chunk_by_nodes, count_tokens, fits_in_token_budget, get_token_info, split_into_token_chunks,
    truncate_to_tokens, CodeChunk, MarkdownChunk, MarkdownChunker, TokenInfo,
};

pub use config::{Config, ConfigError};

#[cfg(feature = "embeddings")]
pub use embeddings::{cosine_similarity, Embedding, EmbeddingError, EmbeddingService};

#[cfg(feature = "codegraph")]
pub use codegraph::{CodeGraphBuilder, ScanError, ScanOptions, ScanStats, SymbolEmbedder, SymbolIndexer};

#[cfg(feature = "vector-search")]
pub use search::{
    linear_combination, reciprocal_rank_fusion, reciprocal_rank_fusion_weighted,
    HybridSearchConfig, HybridSearcher, VectorFilter, VectorHit, VectorIndex, VectorIndexConfig,
    VectorSearchError,
};

pub use graphrag::{GraphragBuildOptions, GraphragBuildResult, GraphragEngine};
pub use retriever::{DriftSearchResult, GlobalSearchResult, HybridRetriever, LocalSearchResult};
pub use assembler::{AssembledContext, ContextAssembler, ContextBudget, ContextTemplate, Evidence};
pub use relations::{CrossLayerDetector, MemoryRelationDetector};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Matryoshka-truncated embedding dimensionality used across the engine.
pub const EMBEDDING_DIMENSIONS: usize = 256;

/// Default local embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-ai/nomic-embed-text-v1.5";

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        CodeEdge, CodeNode, Config, ContextAssembler, Entity, GraphragEngine, HybridRetriever,
        Memory, MemoryInput, Storage, StorageError,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::{Embedding, EmbeddingService};

    #[cfg(feature = "vector-search")]
    pub use crate::{HybridSearcher, VectorIndex};
}
