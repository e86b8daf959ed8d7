//! Byte-Budgeted LRU Cache
//!
//! Single-threaded least-recently-used store bounded by the total size of its
//! keys and values. Callers that need sharing wrap it in [`LocalCache`].
//!
//! # Design
//!
//! - Entries live in a slab (`Vec<Option<Node>>`) linked into a doubly-linked
//!   recency list by slot index; freed slots are reused
//! - `HashMap<String, usize>` index for O(1) lookup
//! - Head is most-recently-used, tail is least-recently-used
//!
//! ```text
//!   head ──► [D] ◄──► [A] ◄──► [B] ◄── tail
//!            MRU                LRU
//! ```
//!
//! [`LocalCache`]: super::LocalCache

use std::collections::HashMap;

use tracing::trace;

/// A value that knows how many bytes it occupies in the cache.
pub trait Weighted {
    /// Size in bytes charged against the cache budget
    fn weight(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Invoked with the key and value of every evicted entry, in eviction order.
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Least-recently-used cache bounded by bytes (`0` = unbounded)
pub struct LruCache<V> {
    max_bytes: u64,
    used_bytes: u64,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<String, usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

fn entry_size<V: Weighted>(key: &str, value: &V) -> u64 {
    (key.len() + value.weight()) as u64
}

impl<V: Weighted> LruCache<V> {
    /// Create a cache holding at most `max_bytes` of keys plus values
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted: None,
        }
    }

    /// Create a cache that reports every eviction to `on_evicted`
    pub fn with_eviction_callback<F>(max_bytes: u64, on_evicted: F) -> Self
    where
        F: FnMut(&str, &V) + Send + 'static,
    {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(Box::new(on_evicted));
        cache
    }

    /// Look up a key and mark it most-recently-used
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        Some(&self.slot(idx).value)
    }

    /// Look up a key without touching recency
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&idx| &self.slot(idx).value)
    }

    /// Check if a key is present without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace a value, then evict from the LRU end until the
    /// byte budget holds again.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();

        if let Some(&idx) = self.index.get(&key) {
            let new_weight = value.weight() as u64;
            let old = std::mem::replace(&mut self.slot_mut(idx).value, value);
            self.used_bytes = self.used_bytes + new_weight - old.weight() as u64;
            self.move_to_front(idx);
        } else {
            let size = entry_size(&key, &value);
            let idx = self.alloc(Node {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.push_front(idx);
            self.index.insert(key, idx);
            self.used_bytes += size;
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Evict the least-recently-used entry, returning it
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let idx = self.tail?;
        self.unlink(idx);
        let node = self.slots[idx].take()?;
        self.free.push(idx);
        self.index.remove(&node.key);
        self.used_bytes -= entry_size(&node.key, &node.value);

        trace!(key = %node.key, used_bytes = self.used_bytes, "evicted entry");
        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(&node.key, &node.value);
        }

        Some((node.key, node.value))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently charged (keys plus values)
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Configured byte budget (`0` = unbounded)
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    // =========================================================================
    // Recency list
    // =========================================================================

    fn slot(&self, idx: usize) -> &Node<V> {
        self.slots[idx]
            .as_ref()
            .expect("lru index points at a live slot")
    }

    fn slot_mut(&mut self, idx: usize) -> &mut Node<V> {
        self.slots[idx]
            .as_mut()
            .expect("lru index points at a live slot")
    }

    fn alloc(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slot(idx);
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let node = self.slot_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slot_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.slot_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn val(s: &str) -> String {
        s.to_string()
    }

    #[test]
    fn test_get_hit_and_miss() {
        let mut cache = LruCache::new(0);
        cache.add("key1", val("1234"));

        assert_eq!(cache.get("key1").map(String::as_str), Some("1234"));
        assert!(cache.get("key2").is_none());
    }

    #[test]
    fn test_remove_oldest_when_over_budget() {
        let (k1, k2, k3) = ("key1", "key2", "k3");
        let (v1, v2, v3) = ("value1", "value2", "v3");
        let budget = (k1.len() + k2.len() + v1.len() + v2.len()) as u64;

        let mut cache = LruCache::new(budget);
        cache.add(k1, val(v1));
        cache.add(k2, val(v2));
        cache.add(k3, val(v3));

        assert!(cache.get(k1).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction_order_is_lru() {
        // Room for exactly two of three same-sized entries
        let mut cache = LruCache::new(4);
        cache.add("A", val("a"));
        cache.add("B", val("b"));
        cache.add("C", val("c"));

        assert!(!cache.contains("A"));
        assert!(cache.contains("B"));
        assert!(cache.contains("C"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(4);
        cache.add("A", val("a"));
        cache.add("B", val("b"));
        cache.get("A");
        cache.add("C", val("c"));

        assert!(cache.contains("A"));
        assert!(!cache.contains("B"));
        assert!(cache.contains("C"));
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let mut cache = LruCache::new(4);
        cache.add("A", val("a"));
        cache.add("B", val("b"));
        assert_eq!(cache.peek("A").map(String::as_str), Some("a"));
        cache.add("C", val("c"));

        assert!(!cache.contains("A"));
    }

    #[test]
    fn test_eviction_callback_order() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);

        let mut cache = LruCache::with_eviction_callback(10, move |key: &str, value: &String| {
            sink.lock().unwrap().push((key.to_string(), value.clone()));
        });
        cache.add("key1", val("123456"));
        cache.add("k2", val("k2"));
        cache.add("k3", val("k3"));
        cache.add("k4", val("k4"));

        let evicted = evicted.lock().unwrap();
        assert_eq!(
            *evicted,
            vec![
                ("key1".to_string(), "123456".to_string()),
                ("k2".to_string(), "k2".to_string()),
            ]
        );
    }

    #[test]
    fn test_replace_adjusts_used_bytes() {
        let mut cache = LruCache::new(0);
        cache.add("key", val("short"));
        assert_eq!(cache.used_bytes(), 8);

        cache.add("key", val("a much longer value"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.used_bytes(), 3 + 19);

        cache.add("key", val("x"));
        assert_eq!(cache.used_bytes(), 4);
    }

    #[test]
    fn test_replace_marks_most_recent() {
        let mut cache = LruCache::new(4);
        cache.add("A", val("a"));
        cache.add("B", val("b"));
        cache.add("A", val("z"));
        cache.add("C", val("c"));

        assert_eq!(cache.peek("A").map(String::as_str), Some("z"));
        assert!(!cache.contains("B"));
    }

    #[test]
    fn test_unbounded_never_evicts() {
        let mut cache = LruCache::new(0);
        for i in 0..1000 {
            cache.add(format!("key-{}", i), vec![0u8; 64]);
        }
        assert_eq!(cache.len(), 1000);
        assert_eq!(cache.max_bytes(), 0);
    }

    #[test]
    fn test_oversized_entry_evicts_itself() {
        let mut cache = LruCache::new(8);
        cache.add("small", val("a"));
        cache.add("huge", val("0123456789"));

        assert!(cache.is_empty());
        assert_eq!(cache.used_bytes(), 0);
    }

    #[test]
    fn test_remove_oldest_on_empty() {
        let mut cache: LruCache<String> = LruCache::new(10);
        assert!(cache.remove_oldest().is_none());
    }

    #[test]
    fn test_slots_are_reused() {
        let mut cache = LruCache::new(4);
        for i in 0..100 {
            cache.add(format!("{}", i % 10), val("v"));
        }
        assert!(cache.slots.len() <= 3);
        assert!(cache.used_bytes() <= 4);
    }
}
