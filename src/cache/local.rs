//! Concurrency-Safe Cache Wrapper
//!
//! Serializes all access to one [`LruCache`] behind a single mutex. Reads take
//! the same lock as writes because a hit reorders the recency list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::byteview::ByteView;
use super::lru::LruCache;

/// Thread-safe LRU of [`ByteView`]s, built lazily on first insert
pub struct LocalCache {
    max_bytes: u64,
    lru: Mutex<Option<LruCache<ByteView>>>,
    evictions: Arc<AtomicU64>,
}

impl LocalCache {
    /// Create an empty wrapper; no LRU is allocated until the first `add`
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            lru: Mutex::new(None),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Insert a value; any eviction cascade runs under the same lock
    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.lru.lock();
        let lru = guard.get_or_insert_with(|| {
            let evictions = Arc::clone(&self.evictions);
            LruCache::with_eviction_callback(self.max_bytes, move |key: &str, value: &ByteView| {
                evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key, bytes = value.len(), "evicted cached value");
            })
        });
        lru.add(key, value);
    }

    /// Look up a value and mark it most-recently-used
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.lru.lock();
        guard.as_mut()?.get(key).cloned()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, LruCache::len)
    }

    /// Check if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently charged against the budget
    pub fn used_bytes(&self) -> u64 {
        self.lru.lock().as_ref().map_or(0, LruCache::used_bytes)
    }

    /// Configured byte budget (`0` = unbounded)
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Number of entries evicted so far
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lazy_construction() {
        let cache = LocalCache::new(1024);
        assert!(cache.get("missing").is_none());
        assert!(cache.lru.lock().is_none());

        cache.add("key", ByteView::from("value"));
        assert!(cache.lru.lock().is_some());
        assert_eq!(cache.get("key"), Some(ByteView::from("value")));
    }

    #[test]
    fn test_eviction_counter() {
        let cache = LocalCache::new(4);
        cache.add("A", ByteView::from("a"));
        cache.add("B", ByteView::from("b"));
        cache.add("C", ByteView::from("c"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.evictions(), 1);
        assert_eq!(cache.used_bytes(), 4);
    }

    #[test]
    fn test_concurrent_access_respects_budget() {
        let cache = Arc::new(LocalCache::new(4096));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..500 {
                        let key = format!("obj-{}-{}", t, i);
                        cache.add(&key, ByteView::from(vec![i as u8; 32]));
                        cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.used_bytes() <= 4096);
        assert!(cache.evictions() > 0);
    }
}
