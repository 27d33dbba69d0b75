//! Code graph builder (§4.2): file discovery, hashing, incremental
//! tree-sitter symbol extraction, and heuristic summaries.

pub mod discover;
mod languages;
pub mod parser_pool;
mod scan;
mod summary;

#[cfg(feature = "watch")]
#[cfg_attr(docsrs, doc(cfg(feature = "watch")))]
pub mod watcher;

pub use discover::{default_excludes, default_includes, discover_files, DiscoveryError, DiscoveryErrorCode};
pub use languages::extract_symbols;
pub use parser_pool::{create_parser_pool, ParseRequest, ParseResult, ParserPool, SourceLanguage};
pub use scan::{CodeGraphBuilder, ScanError, ScanOptions, ScanStats, SymbolEmbedder, SymbolIndexer};
pub use summary::{summarize, SUMMARY_CONFIDENCE_THRESHOLD};
