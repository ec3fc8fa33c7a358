//! Concurrency for fragment compression and decoded-block caching.
//!
//! [`pool::Pool`] is the write-side worker pool: a bounded batch of
//! independent fragments goes in, compressed segments ordered by
//! sequence number come out, using `rayon` under the `parallel`
//! feature and running inline otherwise. [`DecodedBlockCache`] is the
//! read-side complement: repeated random-access extraction from the
//! same fragment shouldn't re-run the predictor+coder pipeline, so
//! decoded fragment bytes are kept in a small bounded LRU.

pub mod pool;

pub use pool::{CompressedFragment, CompressionTask, Pool};

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::journal::FragmentId;

fn lock_or_recover<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("streaming DecodedBlockCache mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// A bounded cache of decoded fragment bytes, shared across readers.
///
/// Keyed by [`FragmentId`] rather than archive offset, since the same
/// fragment may be referenced from several paths (that's the point of
/// deduplication) and each should only need decoding once per cache
/// lifetime.
pub struct DecodedBlockCache {
    inner: Mutex<LruCache<FragmentId, Arc<Vec<u8>>>>,
}

impl DecodedBlockCache {
    /// Creates a cache holding at most `capacity` decoded fragments.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the decoded bytes for `id`, if cached.
    pub fn get(&self, id: FragmentId) -> Option<Arc<Vec<u8>>> {
        lock_or_recover(&self.inner).get(&id).cloned()
    }

    /// Inserts decoded bytes for `id`, evicting the least-recently-used
    /// entry if the cache is full.
    pub fn insert(&self, id: FragmentId, data: Arc<Vec<u8>>) {
        lock_or_recover(&self.inner).put(id, data);
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        lock_or_recover(&self.inner).len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        lock_or_recover(&self.inner).is_empty()
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        lock_or_recover(&self.inner).clear();
    }
}
