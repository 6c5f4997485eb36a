use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::remote::FetchRequest;
use crate::types::Transaction;

/// Manages caching of fetched transaction sets, keyed by the exact request.
///
/// Only raw rows are cached; aggregates are always recomputed from them.
#[derive(Debug)]
pub struct CacheManager {
    cache: LruCache<FetchRequest, Arc<Vec<Transaction>>>,
}

impl CacheManager {
    /// Create a cache holding at most `capacity` datasets (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Store a dataset, evicting the least recently used one when full
    pub fn store(&mut self, key: FetchRequest, rows: Arc<Vec<Transaction>>) {
        self.cache.put(key, rows);
    }

    /// Retrieve a dataset and mark it as recently used
    pub fn get(&mut self, key: &FetchRequest) -> Option<Arc<Vec<Transaction>>> {
        self.cache.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Clear the cache
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
