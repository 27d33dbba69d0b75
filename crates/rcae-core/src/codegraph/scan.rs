//! Code graph builder orchestration (§4.2)
//!
//! Ties file discovery, hashing, parsing, and summary extraction together
//! into a single incremental `scan()`. Parsing defers first to an external
//! compiler-accurate indexer when one is registered, falling back to the
//! tree-sitter worker pool otherwise — the indexer is absent by default in
//! this local-first engine, so the fallback is the path exercised in
//! practice.

use super::discover::{self, discover_files};
use super::languages::extract_symbols;
use super::parser_pool::{ParseRequest, ParserPool, SourceLanguage};
use super::summary::summarize;
use crate::model::{CodeEdge, CodeNode, CodeNodeKind};
use crate::storage::Storage;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
    #[error("discovery error: {0}")]
    Discover(#[from] discover::DiscoveryError),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// An external compiler-accurate symbol source (SCIP-shaped), consulted
/// before the tree-sitter fallback when registered.
pub trait SymbolIndexer: Send + Sync {
    fn index_file(&self, path: &Path, content: &str) -> Option<(Vec<CodeNode>, Vec<CodeEdge>)>;
}

/// Produces embeddings for newly added/updated symbols. Batch failures fall
/// back to per-item embedding; items that still fail yield `None` and are
/// skipped rather than aborting the scan.
pub trait SymbolEmbedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>>;
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub max_files: usize,
    pub batch_size: usize,
    pub embed: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            includes: discover::default_includes(),
            excludes: discover::default_excludes(),
            max_files: 50_000,
            batch_size: 200,
            embed: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub added: u32,
    pub updated: u32,
    pub deleted: u32,
    pub unchanged: u32,
    pub touched_node_ids: Vec<String>,
    /// `(node_id, vector)` pairs produced by the embedding step, for the
    /// caller to push into the vector index.
    pub embedded: Vec<(String, Vec<f32>)>,
}

pub struct CodeGraphBuilder {
    storage: Arc<Storage>,
    parser_pool: ParserPool,
    indexer: Option<Arc<dyn SymbolIndexer>>,
    embedder: Option<Arc<dyn SymbolEmbedder>>,
}

impl CodeGraphBuilder {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            parser_pool: super::parser_pool::create_parser_pool(),
            indexer: None,
            embedder: None,
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn SymbolIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn SymbolEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn scan(&self, options: &ScanOptions) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        let discovered = discover_files(
            &options.root,
            &options.includes,
            &options.excludes,
            options.max_files,
        )?;
        let discovered_rel: HashSet<String> = discovered
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();

        for existing in self.storage.all_file_hashes()? {
            if !discovered_rel.contains(&existing.file_path) {
                self.storage.delete_code_nodes_for_file(&existing.file_path)?;
                self.storage.delete_file_hash(&existing.file_path)?;
                stats.deleted += 1;
            }
        }

        let mut pending_nodes: Vec<CodeNode> = Vec::new();
        let mut pending_edges: Vec<CodeEdge> = Vec::new();
        let mut pending_paths: Vec<(String, String)> = Vec::new();
        let mut embed_candidates: Vec<(String, String)> = Vec::new();

        for rel_path in &discovered {
            let rel_str = rel_path.to_string_lossy().to_string();
            let abs_path = options.root.join(rel_path);
            let content = match std::fs::read_to_string(&abs_path) {
                Ok(c) => c,
                Err(err) => {
                    tracing::warn!(path = %rel_str, error = %err, "skipping unreadable file");
                    continue;
                }
            };
            let hash = blake3::hash(content.as_bytes()).to_hex().to_string();
            let previous = self.storage.get_file_hash(&rel_str)?;
            match previous {
                Some(prev) if prev.hash == hash => {
                    stats.unchanged += 1;
                    continue;
                }
                Some(_) => stats.updated += 1,
                None => stats.added += 1,
            }

            let (mut nodes, mut edges) = self.parse_file(&rel_str, &abs_path, &content);
            if nodes.is_empty() {
                nodes.push(synthesize_module_node(&rel_str));
            }
            for node in &mut nodes {
                summarize(node, &content);
                stats.touched_node_ids.push(node.id.clone());
                if node.kind != CodeNodeKind::Module {
                    let text = format!(
                        "{} {}",
                        node.name,
                        node.signature.clone().unwrap_or_default()
                    );
                    embed_candidates.push((node.id.clone(), text));
                }
            }
            pending_edges.append(&mut edges);
            pending_nodes.append(&mut nodes);
            pending_paths.push((rel_str, hash));

            if pending_nodes.len() >= options.batch_size {
                self.flush_batch(&mut pending_nodes, &mut pending_edges, &mut pending_paths);
            }
        }
        self.flush_batch(&mut pending_nodes, &mut pending_edges, &mut pending_paths);

        if options.embed {
            if let Some(embedder) = &self.embedder {
                stats.embedded = self.embed_candidates(embedder.as_ref(), embed_candidates);
            }
        }

        Ok(stats)
    }

    fn parse_file(&self, rel_path: &str, abs_path: &Path, content: &str) -> (Vec<CodeNode>, Vec<CodeEdge>) {
        if let Some(indexer) = &self.indexer {
            if let Some((nodes, edges)) = indexer.index_file(abs_path, content) {
                return (nodes, edges);
            }
        }
        let Some(ext) = abs_path.extension().and_then(|e| e.to_str()) else {
            return (Vec::new(), Vec::new());
        };
        let Some(language) = SourceLanguage::from_extension(ext) else {
            return (Vec::new(), Vec::new());
        };
        let request = ParseRequest {
            language,
            content: content.to_string(),
            path: abs_path.to_path_buf(),
        };
        match self.parser_pool.parse_blocking(request) {
            Some(parsed) => extract_symbols(language, &parsed.tree, &parsed.content, rel_path),
            None => {
                tracing::warn!(path = %rel_path, "parse failed, falling back to module node");
                (Vec::new(), Vec::new())
            }
        }
    }

    fn flush_batch(
        &self,
        nodes: &mut Vec<CodeNode>,
        edges: &mut Vec<CodeEdge>,
        paths: &mut Vec<(String, String)>,
    ) {
        if nodes.is_empty() && paths.is_empty() {
            return;
        }
        for (path, _) in paths.iter() {
            if let Err(err) = self.storage.delete_code_nodes_for_file(path) {
                tracing::error!(path = %path, error = %err, "failed clearing stale nodes, skipping batch");
                nodes.clear();
                edges.clear();
                paths.clear();
                return;
            }
        }
        if let Err(err) = self.storage.upsert_code_batch(nodes, edges) {
            tracing::error!(error = %err, batch_size = nodes.len(), "batch upsert failed, skipping batch");
        } else {
            for (path, hash) in paths.iter() {
                if let Err(err) = self.storage.upsert_file_hash(path, hash) {
                    tracing::error!(path = %path, error = %err, "failed recording file hash");
                }
            }
        }
        nodes.clear();
        edges.clear();
        paths.clear();
    }

    fn embed_candidates(
        &self,
        embedder: &dyn SymbolEmbedder,
        candidates: Vec<(String, String)>,
    ) -> Vec<(String, Vec<f32>)> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let texts: Vec<String> = candidates.iter().map(|(_, t)| t.clone()).collect();
        let vectors = embedder.embed_batch(&texts);
        if vectors.len() == candidates.len() {
            return candidates
                .into_iter()
                .zip(vectors)
                .filter_map(|((id, _), vector)| {
                    vector.filter(|v| !v.is_empty()).map(|v| (id, v))
                })
                .collect();
        }
        tracing::warn!("batch embedding failed, falling back to per-item");
        candidates
            .into_iter()
            .filter_map(|(id, text)| {
                embedder
                    .embed_batch(&[text])
                    .into_iter()
                    .next()
                    .flatten()
                    .filter(|v| !v.is_empty())
                    .map(|v| (id, v))
            })
            .collect()
    }
}

fn synthesize_module_node(rel_path: &str) -> CodeNode {
    let now = Utc::now();
    let name = Path::new(rel_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(rel_path)
        .to_string();
    CodeNode {
        id: CodeNode::make_id(rel_path, CodeNodeKind::Module, &name),
        kind: CodeNodeKind::Module,
        name,
        file_path: rel_path.to_string(),
        start_line: Some(1),
        end_line: None,
        signature: None,
        summary: None,
        summary_confidence: 0.0,
        needs_ai_summary: false,
        metadata: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    struct StubEmbedder;
    impl SymbolEmbedder for StubEmbedder {
        fn embed_batch(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
            texts.iter().map(|_| Some(vec![0.1, 0.2])).collect()
        }
    }

    fn storage() -> Arc<Storage> {
        Arc::new(Storage::open_in_memory().unwrap())
    }

    #[test]
    fn test_scan_synthesizes_module_node_for_unparsed_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "# hello").unwrap();
        let builder = CodeGraphBuilder::new(storage());
        let options = ScanOptions {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let stats = builder.scan(&options).unwrap();
        assert_eq!(stats.added, 1);
        assert_eq!(stats.touched_node_ids.len(), 1);
    }

    #[test]
    fn test_scan_marks_unchanged_on_second_pass() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}\n").unwrap();
        let builder = CodeGraphBuilder::new(storage());
        let options = ScanOptions {
            root: dir.path().to_path_buf(),
            embed: false,
            ..Default::default()
        };
        builder.scan(&options).unwrap();
        let second = builder.scan(&options).unwrap();
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.added, 0);
    }

    #[test]
    fn test_scan_detects_deleted_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.rs");
        fs::write(&path, "fn main() {}\n").unwrap();
        let builder = CodeGraphBuilder::new(storage());
        let options = ScanOptions {
            root: dir.path().to_path_buf(),
            embed: false,
            ..Default::default()
        };
        builder.scan(&options).unwrap();
        fs::remove_file(&path).unwrap();
        let stats = builder.scan(&options).unwrap();
        assert_eq!(stats.deleted, 1);
    }

    #[test]
    fn test_scan_embeds_new_symbols_with_registered_embedder() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "pub fn add(a: i32) -> i32 { a }\n").unwrap();
        let builder = CodeGraphBuilder::new(storage()).with_embedder(Arc::new(StubEmbedder));
        let options = ScanOptions {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let stats = builder.scan(&options).unwrap();
        assert!(!stats.embedded.is_empty());
    }
}
