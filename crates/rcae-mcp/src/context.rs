//! Engine context construction (§9 re-architecture: "ambient singletons" →
//! an explicit owned handle passed through a context object).
//!
//! Builds the one [`EngineContext`] a process needs: storage, the injected
//! embedder/vector-backend capabilities, and the always-compiled
//! graphrag/retriever/assembler/relations engines built on top of them. The
//! embedding model load is the one process-wide [`std::sync::OnceLock`]
//! retained from the teacher's own singleton pattern — loading the ONNX
//! model twice per process is wasteful regardless of architecture.

use rcae_core::capability::{Embedder, SearchFilter, VectorBackend, VectorMatch};
use rcae_core::config::Config;
use rcae_core::model::VectorPayload;
use rcae_core::relations::{CrossLayerDetector, MemoryRelationDetector};
use rcae_core::{ContextAssembler, GraphragEngine, HybridRetriever, Storage, StorageError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("config error: {0}")]
    Config(#[from] rcae_core::config::ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "vector-search")]
    #[error("vector backend error: {0}")]
    VectorBackend(#[from] rcae_core::VectorSearchError),
}

/// An [`Embedder`] that never produces a vector, used when the `embeddings`
/// feature is disabled. Callers degrade to lexical-only ranking.
struct NullEmbedder;
impl Embedder for NullEmbedder {
    fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

/// A [`VectorBackend`] with no vectors, used when the `vector-search`
/// feature is disabled.
struct NullVectorBackend;
impl VectorBackend for NullVectorBackend {
    fn upsert(&self, _key: &str, _vector: &[f32], _payload: VectorPayload) -> bool {
        false
    }
    fn search(&self, _query: &[f32], _limit: usize, _filter: &SearchFilter) -> Vec<VectorMatch> {
        Vec::new()
    }
    fn remove_by_memory_id(&self, _memory_id: &str) -> usize {
        0
    }
    fn remove_key(&self, _key: &str) -> bool {
        false
    }
}

/// The `.rcae/` on-disk layout, resolved relative to a project root (§6).
pub struct ProjectPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub vectors_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let root = project_root.into();
        let rcae_dir = root.join(".rcae");
        Self {
            config_path: rcae_dir.join("config.json"),
            db_path: rcae_dir.join("rcae.db"),
            vectors_dir: rcae_dir.join("vectors"),
            root,
        }
    }

    fn vectors_index_path(&self) -> PathBuf {
        self.vectors_dir.join("index.usearch")
    }
}

/// Every shared handle a tool needs, built once per process and cloned
/// cheaply (everything inside is an `Arc`).
#[derive(Clone)]
pub struct EngineContext {
    pub storage: Arc<Storage>,
    pub embedder: Arc<dyn Embedder>,
    pub vectors: Arc<dyn VectorBackend>,
    pub config: Config,
    pub paths: Arc<ProjectPaths>,
    pub graphrag: Arc<GraphragEngine>,
    pub retriever: Arc<HybridRetriever>,
    pub assembler: Arc<ContextAssembler>,
    pub memory_relations: Arc<MemoryRelationDetector>,
    pub cross_layer_relations: Arc<CrossLayerDetector>,
}

impl EngineContext {
    /// Opens (creating if needed) the `.rcae/` store under `project_root`
    /// and wires every engine on top of it.
    pub fn open(project_root: impl Into<PathBuf>) -> Result<Self, ContextError> {
        let paths = ProjectPaths::new(project_root);
        std::fs::create_dir_all(&paths.vectors_dir)?;

        let config = Config::load_or_default(&paths.config_path)?;
        if !paths.config_path.exists() {
            config.save(&paths.config_path)?;
        }

        let storage = Arc::new(Storage::new(Some(paths.db_path.clone()))?);
        let embedder = build_embedder(&config);
        let vectors = build_vector_backend(&paths, &config)?;

        let graphrag = Arc::new(
            GraphragEngine::new(storage.clone(), embedder.clone(), vectors.clone())
                .with_min_community_size(config.community_min_size),
        );
        let retriever = Arc::new(HybridRetriever::new(
            storage.clone(),
            embedder.clone(),
            vectors.clone(),
        ));
        let assembler = Arc::new(ContextAssembler::new(
            storage.clone(),
            embedder.clone(),
            vectors.clone(),
        ));
        let memory_relations = Arc::new(
            MemoryRelationDetector::new(storage.clone()).with_embedder(embedder.clone()),
        );
        let cross_layer_relations = Arc::new(CrossLayerDetector::new(storage.clone()));

        Ok(Self {
            storage,
            embedder,
            vectors,
            config,
            paths: Arc::new(paths),
            graphrag,
            retriever,
            assembler,
            memory_relations,
            cross_layer_relations,
        })
    }

    /// Persists the vector index to `.rcae/vectors/`, when the backend
    /// supports it. No-op under the null backend.
    #[cfg(feature = "vector-search")]
    pub fn persist_vectors(&self, index: &std::sync::Mutex<rcae_core::VectorIndex>) -> Result<(), ContextError> {
        let guard = index.lock().map_err(|_| {
            ContextError::Io(std::io::Error::other("vector index lock poisoned"))
        })?;
        guard.save(&self.paths.vectors_index_path())?;
        Ok(())
    }
}

#[cfg(feature = "embeddings")]
fn build_embedder(_config: &Config) -> Arc<dyn Embedder> {
    let service = rcae_core::EmbeddingService::new();
    if let Err(err) = service.init() {
        warn!(%err, "embedding service failed to initialize, falling back to lexical-only ranking");
    } else {
        info!("local embedding service ready");
    }
    Arc::new(service)
}

#[cfg(not(feature = "embeddings"))]
fn build_embedder(_config: &Config) -> Arc<dyn Embedder> {
    Arc::new(NullEmbedder)
}

#[cfg(feature = "vector-search")]
fn build_vector_backend(
    paths: &ProjectPaths,
    config: &Config,
) -> Result<Arc<dyn VectorBackend>, ContextError> {
    use rcae_core::{VectorIndex, VectorIndexConfig};

    let index_config = VectorIndexConfig {
        dimensions: config.embedding.dimensions,
        ..VectorIndexConfig::default()
    };
    let index_path = paths.vectors_index_path();
    let index = if index_path.exists() {
        match VectorIndex::load(&index_path, index_config.clone()) {
            Ok(index) => index,
            Err(err) => {
                warn!(%err, path = %index_path.display(), "failed to load persisted vector index, starting empty");
                VectorIndex::with_config(index_config)?
            }
        }
    } else {
        VectorIndex::with_config(index_config)?
    };
    Ok(Arc::new(std::sync::Mutex::new(index)))
}

#[cfg(not(feature = "vector-search"))]
fn build_vector_backend(
    _paths: &ProjectPaths,
    _config: &Config,
) -> Result<Arc<dyn VectorBackend>, ContextError> {
    Ok(Arc::new(NullVectorBackend))
}

/// The project root used when none is given on the command line: the
/// `RCAE_PROJECT_ROOT` environment variable, or the current working
/// directory (§6 Environment inputs).
pub fn default_project_root() -> PathBuf {
    std::env::var_os("RCAE_PROJECT_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
