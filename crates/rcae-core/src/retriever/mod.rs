//! Hybrid retrieval over the entity/community graph (§4.6)

mod drift;
mod fusion;
mod global;
mod lexical;
mod local;

pub use drift::{
    drift_search, DriftSearchResult, DEFAULT_CONVERGENCE_THRESHOLD as DEFAULT_DRIFT_CONVERGENCE_THRESHOLD,
    DEFAULT_MAX_ITERATIONS as DEFAULT_DRIFT_MAX_ITERATIONS,
};
pub use fusion::{FusionWeights, HybridRetriever};
pub use global::{global_search, GlobalSearchResult, DEFAULT_LEVEL as DEFAULT_GLOBAL_LEVEL, DEFAULT_LIMIT as DEFAULT_GLOBAL_LIMIT};
pub use local::{
    local_search, LocalSearchOptions, LocalSearchResult, DEFAULT_MAX_DEPTH, DEFAULT_MIN_EDGE_WEIGHT,
    DEFAULT_SEED_COUNT,
};
