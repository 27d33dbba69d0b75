//! The hybrid retriever (§4.6): a thin façade over local/global/drift search
//! plus multi-source RRF fusion against code search results.

use super::drift::{drift_search, DriftSearchResult, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_MAX_ITERATIONS};
use super::global::{global_search, GlobalSearchResult, DEFAULT_LEVEL, DEFAULT_LIMIT};
use super::local::{local_search, LocalSearchOptions, LocalSearchResult};
use crate::capability::{reciprocal_rank_fusion_weighted, Embedder, VectorBackend};
use crate::storage::{Storage, StorageError};
use std::sync::Arc;

/// Per-source weights for [`HybridRetriever::fuse`] (§4.6 "Fusion at the
/// context layer").
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub local: f32,
    pub global: f32,
    pub code: f32,
    pub rrf_k: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            local: 1.0,
            global: 0.6,
            code: 0.8,
            rrf_k: 60.0,
        }
    }
}

/// Entry point for local/global/drift entity-graph search, backed by an
/// injected embedder and vector backend so it compiles without the
/// `embeddings`/`vector-search` features enabled.
pub struct HybridRetriever {
    storage: Arc<Storage>,
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorBackend>,
    local_options: LocalSearchOptions,
    global_level: u32,
    global_limit: usize,
    max_drift_iterations: u32,
    drift_convergence_threshold: f32,
    fusion_weights: FusionWeights,
}

impl HybridRetriever {
    pub fn new(storage: Arc<Storage>, embedder: Arc<dyn Embedder>, vectors: Arc<dyn VectorBackend>) -> Self {
        Self {
            storage,
            embedder,
            vectors,
            local_options: LocalSearchOptions::default(),
            global_level: DEFAULT_LEVEL,
            global_limit: DEFAULT_LIMIT,
            max_drift_iterations: DEFAULT_MAX_ITERATIONS,
            drift_convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            fusion_weights: FusionWeights::default(),
        }
    }

    pub fn with_fusion_weights(mut self, weights: FusionWeights) -> Self {
        self.fusion_weights = weights;
        self
    }

    pub fn with_global_level(mut self, level: u32) -> Self {
        self.global_level = level;
        self
    }

    pub fn local_search(&self, query: &str) -> Result<LocalSearchResult, StorageError> {
        local_search(
            &self.storage,
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            query,
            self.local_options,
        )
    }

    pub fn global_search(&self, query: &str) -> Result<GlobalSearchResult, StorageError> {
        global_search(
            &self.storage,
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            query,
            self.global_level,
            self.global_limit,
        )
    }

    pub fn drift_search(&self, query: &str) -> Result<DriftSearchResult, StorageError> {
        drift_search(
            &self.storage,
            self.embedder.as_ref(),
            self.vectors.as_ref(),
            query,
            self.local_options,
            self.max_drift_iterations,
            self.drift_convergence_threshold,
        )
    }

    /// Runs local and global search, then fuses their entity/report rankings
    /// with an externally-supplied ranked code-search candidate list (entity
    /// id / code node id / report id -> score) via weighted RRF.
    pub fn fuse(
        &self,
        query: &str,
        code_candidates: &[(String, f32)],
    ) -> Result<Vec<(String, f32)>, StorageError> {
        let local = self.local_search(query)?;
        let global = self.global_search(query)?;

        let local_ranked: Vec<(String, f32)> = {
            let mut ranked: Vec<(String, f32)> = local.scores.into_iter().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked
        };
        let global_ranked: Vec<(String, f32)> = {
            let mut ranked: Vec<(String, f32)> = global.scores.into_iter().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked
        };

        let sources: Vec<(&[(String, f32)], f32)> = vec![
            (local_ranked.as_slice(), self.fusion_weights.local),
            (global_ranked.as_slice(), self.fusion_weights.global),
            (code_candidates, self.fusion_weights.code),
        ];

        Ok(reciprocal_rank_fusion_weighted(&sources, self.fusion_weights.rrf_k))
    }
}
