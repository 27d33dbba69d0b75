//! Relation detectors over memories and code (§4.8)

mod cross_layer;
mod memory_memory;

pub use cross_layer::{CrossLayerDetector, DEFAULT_CONFIDENCE_THRESHOLD as DEFAULT_CROSS_LAYER_CONFIDENCE_THRESHOLD};
pub use memory_memory::{
    MemoryRelationDetector, DEFAULT_CONFIDENCE_THRESHOLD as DEFAULT_MEMORY_RELATION_CONFIDENCE_THRESHOLD,
    SUPERSEDES_TITLE_OVERLAP,
};
