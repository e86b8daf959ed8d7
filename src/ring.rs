//! Consistent Hash Ring
//!
//! Maps keys to node identities through `replicas` virtual nodes per real
//! node. Adding a node only moves the keys that fall between its new virtual
//! positions and their predecessors, unlike `hash(key) % n`.
//!
//! ```text
//!        2 ──── 4 ──── 6 ──── 12 ──── 14 ──── 16 ──── 22 ──── 24 ──── 26
//!        ▲                                                             │
//!        └──────────────────────── wrap around ────────────────────────┘
//! ```

use std::collections::HashMap;

/// Hash function used to place virtual nodes and keys on the ring
pub type HashFn = fn(&[u8]) -> u32;

/// Default virtual nodes per real node
pub const DEFAULT_REPLICAS: usize = 50;

/// Consistent hash ring of string node identities
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node positions
    keys: Vec<u32>,
    /// Virtual node position → real node
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Create an empty ring hashed with CRC-32 (IEEE)
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32fast::hash)
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            keys: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Place every node on the ring `replicas` times.
    ///
    /// Virtual node `i` of node `id` sits at `hash(format!("{i}{id}"))`.
    pub fn add_nodes<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, id).as_bytes());
                if self.nodes.insert(hash, id.to_string()).is_none() {
                    self.keys.push(hash);
                }
            }
        }
        self.keys.sort_unstable();
    }

    /// Node owning `key`: the first virtual node at or after its hash,
    /// wrapping to the start. `None` only when the ring is empty.
    pub fn pick_node(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&k| k < hash) % self.keys.len();
        self.nodes.get(&self.keys[idx]).map(String::as_str)
    }

    /// Number of distinct real nodes
    pub fn len(&self) -> usize {
        let mut real: Vec<&str> = self.nodes.values().map(String::as_str).collect();
        real.sort_unstable();
        real.dedup();
        real.len()
    }

    /// Check if the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.keys.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Treats the key as a decimal number so ring positions are predictable.
    fn numeric_hash(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_pick_node_with_wraparound() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);
        // 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add_nodes(["6", "4", "2"]);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, node) in cases {
            assert_eq!(ring.pick_node(key), Some(node), "key {}", key);
        }
    }

    #[test]
    fn test_adding_node_remaps_bounded_set() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);
        ring.add_nodes(["6", "4", "2"]);

        // 8, 18, 28
        ring.add_nodes(["8"]);

        assert_eq!(ring.pick_node("27"), Some("8"));
        assert_eq!(ring.pick_node("2"), Some("2"));
        assert_eq!(ring.pick_node("11"), Some("2"));
        assert_eq!(ring.pick_node("23"), Some("4"));
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new(DEFAULT_REPLICAS);
        assert!(ring.is_empty());
        assert_eq!(ring.pick_node("anything"), None);
    }

    #[test]
    fn test_each_node_contributes_replicas() {
        let mut ring = HashRing::new(10);
        ring.add_nodes(["http://a:8001", "http://b:8002", "http://c:8003"]);

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.keys.len(), 30);
        assert!(ring.keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_crc32_distribution_covers_all_nodes() {
        let mut ring = HashRing::new(DEFAULT_REPLICAS);
        ring.add_nodes(["http://a:8001", "http://b:8002", "http://c:8003"]);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..3000 {
            let node = ring.pick_node(&format!("key-{}", i)).unwrap();
            *counts.entry(node).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c > 300));
    }

    #[test]
    fn test_pick_is_deterministic() {
        let mut a = HashRing::new(DEFAULT_REPLICAS);
        let mut b = HashRing::new(DEFAULT_REPLICAS);
        a.add_nodes(["x", "y", "z"]);
        b.add_nodes(["z", "x", "y"]);

        for i in 0..100 {
            let key = format!("k{}", i);
            assert_eq!(a.pick_node(&key), b.pick_node(&key));
        }
    }
}
