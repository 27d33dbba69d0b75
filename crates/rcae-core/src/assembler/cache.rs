//! Assembled-context cache (§4.7 step 5)
//!
//! Keyed by `(query, budget, template, flags)` so two calls with identical
//! inputs skip retrieval entirely; any write to memories, code, or the
//! entity graph invalidates the whole cache via [`reset_context_cache`]
//! rather than tracking per-key staleness.

use super::budget::ContextBudget;
use super::ContextTemplate;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

const CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextCacheKey(u64);

impl ContextCacheKey {
    pub fn new(query: &str, budget: ContextBudget, template: ContextTemplate, include_code: bool, include_graph: bool) -> Self {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        budget.hash(&mut hasher);
        template.hash(&mut hasher);
        include_code.hash(&mut hasher);
        include_graph.hash(&mut hasher);
        Self(hasher.finish())
    }
}

type Cache = Mutex<LruCache<ContextCacheKey, super::AssembledContext>>;

fn global_cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(LruCache::new(NonZeroUsize::new(CACHE_CAPACITY).unwrap())))
}

pub fn get_cached(key: ContextCacheKey) -> Option<super::AssembledContext> {
    global_cache().lock().ok()?.get(&key).cloned()
}

pub fn put_cached(key: ContextCacheKey, value: super::AssembledContext) {
    if let Ok(mut cache) = global_cache().lock() {
        cache.put(key, value);
    }
}

/// Drops every cached assembled context. Call after any write that could
/// change retrieval results (new memory, rescan, graphrag rebuild).
pub fn reset_context_cache() {
    if let Ok(mut cache) = global_cache().lock() {
        cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::ContextTemplate;

    #[test]
    fn test_cache_key_differs_on_query() {
        let budget = ContextBudget::default();
        let a = ContextCacheKey::new("foo", budget, ContextTemplate::Default, true, true);
        let b = ContextCacheKey::new("bar", budget, ContextTemplate::Default, true, true);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_key_same_inputs_match() {
        let budget = ContextBudget::default();
        let a = ContextCacheKey::new("foo", budget, ContextTemplate::Compact, true, false);
        let b = ContextCacheKey::new("foo", budget, ContextTemplate::Compact, true, false);
        assert_eq!(a, b);
    }
}
