//! LRU cache for query expansions.
//!
//! Expansions are a pure function of the query and the dictionary snapshot,
//! so entries are keyed by both the query text and the snapshot generation.
//! A reloaded dictionary therefore never serves stale expansions.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::search::expand::QueryExpansion;

/// Default cache size for expansions (number of queries)
pub const DEFAULT_EXPANSION_CACHE_SIZE: usize = 128;

/// Cache statistics for monitoring and tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner {
    entries: LruCache<(u64, String), QueryExpansion>,
    stats: CacheStats,
}

/// Thread-safe expansion cache.
///
/// All operations use `try_lock`: a contended cache behaves like a miss
/// rather than blocking the request.
pub struct ExpansionCache {
    inner: Mutex<Inner>,
}

impl Default for ExpansionCache {
    fn default() -> Self {
        Self::new(DEFAULT_EXPANSION_CACHE_SIZE)
    }
}

impl ExpansionCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn get(&self, generation: u64, query: &str) -> Option<QueryExpansion> {
        let mut inner = self.inner.try_lock()?;
        let hit = inner
            .entries
            .get(&(generation, query.to_string()))
            .cloned();
        if hit.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        hit
    }

    pub fn put(&self, generation: u64, query: &str, expansion: QueryExpansion) {
        if let Some(mut inner) = self.inner.try_lock() {
            inner.entries.put((generation, query.to_string()), expansion);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.stats = CacheStats::default();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
