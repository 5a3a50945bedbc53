use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lru::LruCache;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::trace;

use super::resolver::Match;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    max_substitutions: u32,
}

type Slot = Arc<OnceCell<Arc<Vec<Match>>>>;

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub computations: usize,
    pub entries: usize,
}

/// LRU memo of resolved matches per (query, substitution budget).
///
/// Each key owns a slot that is filled at most once. Concurrent callers for
/// the same key block on the slot while one of them computes. If that
/// computation fails, the error goes to the caller that ran it, the slot
/// stays empty, and the next waiter computes with its own closure. Failures
/// are never cached.
///
/// A cache belongs to one index; rebuilding the index means a new cache.
pub struct QueryCache {
    slots: Mutex<LruCache<CacheKey, Slot>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    computations: AtomicUsize,
}

impl QueryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(capacity)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            computations: AtomicUsize::new(0),
        }
    }

    pub fn get_or_compute<F>(&self, query: &str, max_substitutions: u32, compute: F) -> Result<Arc<Vec<Match>>>
    where
        F: FnOnce() -> Result<Vec<Match>>,
    {
        let key = CacheKey { query: query.to_ascii_uppercase(), max_substitutions };
        let slot = self.slot(&key);

        if let Some(v) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(v));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let res = slot.get_or_try_init(|| {
            self.computations.fetch_add(1, Ordering::Relaxed);
            trace!(query = %key.query, k = max_substitutions, "cache miss, computing");
            compute().map(Arc::new)
        });
        match res {
            Ok(v) => Ok(Arc::clone(v)),
            Err(e) => {
                // drop the empty slot only if no other caller holds it; a
                // waiter may already be retrying inside the same cell
                let mut slots = self.slots.lock();
                let unshared = slots.peek(&key).is_some_and(|cur| Arc::ptr_eq(cur, &slot))
                    && Arc::strong_count(&slot) == 2;
                if unshared && slot.get().is_none() {
                    slots.pop(&key);
                }
                Err(e)
            }
        }
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = self.slots.lock();
        if let Some(s) = slots.get(key) {
            return Arc::clone(s);
        }
        let s: Slot = Arc::new(OnceCell::new());
        slots.put(key.clone(), Arc::clone(&s));
        s
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").field("stats", &self.stats()).finish()
    }
}
