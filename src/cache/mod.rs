//! # Filter Result Cache
//!
//! Memoizes filtered graphs under a key derived from the source graph's
//! content hash and the structural filter parameters.
//!
//! ## Stores
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryCacheStore` | `memory` | Bounded in-process cache with optional TTL |
//! | `DiskCacheStore` | `disk` | One file per key, survives restarts, optional TTL |
//!
//! The cache is an optimization, never a correctness dependency: any
//! store failure is logged and treated as a miss (on read) or skipped
//! (on write). Concurrent misses on one key may compute twice; filtering
//! is pure, so the duplicate is wasted work only.

pub mod disk;
pub mod memory;

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::filter::{self, FilterParameters, FilteredGraph};
use crate::hash::sha256_hex_parts;
use crate::model::Graph;
use crate::Result;

pub use disk::DiskCacheStore;
pub use memory::MemoryCacheStore;

// ============================================================================
// Cache key
// ============================================================================

/// Hex SHA-256 of `graph content hash || canonical structural params`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(graph: &Graph, params: &FilterParameters) -> Result<Self> {
        let structural = params.structural_bytes()?;
        Ok(Self(sha256_hex_parts(&[graph.content_hash().as_bytes(), &structural])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Store contract
// ============================================================================

/// Atomic key-value storage for serialized filtered graphs.
///
/// Implementations handle their own locking and must tolerate
/// concurrent `get`/`put` from several threads.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()>;

    /// Drop every entry. The only invalidation the engine itself needs.
    fn clear(&self) -> Result<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for Box<S> {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        (**self).put(key, value)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        (**self).put(key, value)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    errors: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stores(&self) -> u64 {
        self.stores.load(Ordering::Relaxed)
    }

    /// Store failures that were degraded to misses or skipped writes.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// 0.0 when nothing has been looked up yet.
    pub fn hit_ratio(&self) -> f64 {
        let (hits, misses) = (self.hits(), self.misses());
        if hits + misses == 0 { 0.0 } else { hits as f64 / (hits + misses) as f64 }
    }

    fn reset(&self) {
        for counter in [&self.hits, &self.misses, &self.stores, &self.errors] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

// ============================================================================
// FilterCache
// ============================================================================

/// A [`CacheStore`] specialised to filtered graphs.
pub struct FilterCache<S: CacheStore> {
    store: S,
    stats: CacheStats,
}

impl<S: CacheStore> FilterCache<S> {
    pub fn new(store: S) -> Self {
        Self { store, stats: CacheStats::default() }
    }

    /// Return the cached result for `(graph, params)` or run `compute`
    /// and store what it returns. `compute` is not called on a hit.
    pub fn get_or_compute<F>(&self, graph: &Graph, params: &FilterParameters, compute: F) -> FilteredGraph
    where
        F: FnOnce() -> FilteredGraph,
    {
        let key = match CacheKey::derive(graph, params) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "cache key derivation failed; computing uncached");
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                return compute();
            }
        };

        if let Some(hit) = self.lookup(&key) {
            return hit;
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(%key, "filter cache miss");
        let result = compute();
        self.store_result(&key, &result);
        result
    }

    /// Cached [`filter::filter`].
    pub fn filter(&self, graph: &Graph, params: &FilterParameters) -> FilteredGraph {
        self.get_or_compute(graph, params, || filter::filter(graph, params))
    }

    /// Wipe the store and the counters.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        self.stats.reset();
        Ok(())
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn lookup(&self, key: &CacheKey) -> Option<FilteredGraph> {
        let bytes = match self.store.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed; treating as miss");
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        match Graph::deserialize(&bytes) {
            Ok(graph) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "filter cache hit");
                Some(graph)
            }
            Err(e) => {
                warn!(%key, error = %e, "cached entry unreadable; treating as miss");
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn store_result(&self, key: &CacheKey, result: &FilteredGraph) {
        let stored = result.serialize().and_then(|bytes| self.store.put(key, bytes));
        match stored {
            Ok(()) => {
                self.stats.stores.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(%key, error = %e, "cache write failed; result not cached");
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Threshold;
    use crate::model::{EdgeKey, EdgeWeights, NodeId};
    use crate::Error;
    use std::cell::Cell;

    struct FailingStore;

    impl CacheStore for FailingStore {
        fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>> {
            Err(Error::CacheError("disk full".into()))
        }
        fn put(&self, _key: &CacheKey, _value: Vec<u8>) -> Result<()> {
            Err(Error::CacheError("disk full".into()))
        }
        fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    fn sample() -> Graph {
        Graph::from_parts(
            Vec::<NodeId>::new(),
            vec![
                (EdgeKey::new("a", "b"), EdgeWeights::new().with("m", 1.0)),
                (EdgeKey::new("b", "c"), EdgeWeights::new().with("m", 3.0)),
            ],
        )
    }

    #[test]
    fn test_key_ignores_layout_and_tracks_graph() {
        let g = sample();
        let p = FilterParameters::new().with_threshold("m", Threshold::inclusive(0.0, 2.0));
        let k1 = CacheKey::derive(&g, &p).unwrap();
        let k2 = CacheKey::derive(&g, &p.clone().with_layout("circle")).unwrap();
        assert_eq!(k1, k2);

        let other = Graph::from_parts(vec!["z".to_string()], vec![]);
        assert_ne!(k1, CacheKey::derive(&other, &p).unwrap());
        assert_eq!(k1.as_str().len(), 64);
    }

    #[test]
    fn test_compute_runs_once() {
        let cache = FilterCache::new(MemoryCacheStore::new(16, None));
        let g = sample();
        let p = FilterParameters::new().with_threshold("m", Threshold::inclusive(0.0, 2.0));
        let calls = Cell::new(0);

        let first = cache.get_or_compute(&g, &p, || {
            calls.set(calls.get() + 1);
            filter::filter(&g, &p)
        });
        let second = cache.get_or_compute(&g, &p, || {
            calls.set(calls.get() + 1);
            filter::filter(&g, &p)
        });

        assert_eq!(calls.get(), 1);
        assert_eq!(first.content_hash(), second.content_hash());
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hit_ratio(), 0.5);
    }

    #[test]
    fn test_store_errors_degrade_to_compute() {
        let cache = FilterCache::new(FailingStore);
        let g = sample();
        let p = FilterParameters::new();
        let out = cache.filter(&g, &p);
        let again = cache.filter(&g, &p);
        assert_eq!(out, again);
        assert_eq!(cache.stats().hits(), 0);
        assert_eq!(cache.stats().errors(), 4);
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let store = MemoryCacheStore::new(16, None);
        let g = sample();
        let p = FilterParameters::new();
        store.put(&CacheKey::derive(&g, &p).unwrap(), b"not json".to_vec()).unwrap();

        let cache = FilterCache::new(store);
        let out = cache.filter(&g, &p);
        assert_eq!(out.edge_count(), 2);
        assert_eq!(cache.stats().errors(), 1);
        // the fresh result replaced the corrupt bytes
        assert_eq!(cache.filter(&g, &p), out);
        assert_eq!(cache.stats().hits(), 1);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let cache = FilterCache::new(MemoryCacheStore::new(16, None));
        let g = sample();
        let p = FilterParameters::new();
        cache.filter(&g, &p);
        cache.clear().unwrap();
        let calls = Cell::new(0);
        cache.get_or_compute(&g, &p, || {
            calls.set(1);
            filter::filter(&g, &p)
        });
        assert_eq!(calls.get(), 1);
    }
}
