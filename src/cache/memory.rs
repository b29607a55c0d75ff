//! In-process cache store.
//!
//! Bounded by entry count with optional time-to-live; eviction is moka's
//! TinyLFU policy. Values live as `Arc<[u8]>`; a hit returns an owned
//! copy.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use super::{CacheKey, CacheStore};
use crate::Result;

pub struct MemoryCacheStore {
    inner: Cache<CacheKey, Arc<[u8]>>,
}

impl MemoryCacheStore {
    pub fn new(max_entries: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self { inner: builder.build() }
    }

    /// Approximate: moka applies pending evictions lazily.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(key).map(|bytes| bytes.to_vec()))
    }

    fn put(&self, key: &CacheKey, value: Vec<u8>) -> Result<()> {
        self.inner.insert(key.clone(), Arc::from(value));
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.inner.invalidate_all();
        Ok(())
    }
}
