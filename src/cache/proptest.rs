//! Property-Based Tests for the LRU Cache
//!
//! # Test Properties
//!
//! 1. **Accounting**: `used_bytes` equals the sum of key + value sizes present
//! 2. **Budget**: `used_bytes <= max_bytes` after every `add` when bounded
//! 3. **Callback**: every evicted key is reported exactly once, in order

#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use super::lru::LruCache;

// =============================================================================
// Property Strategies
// =============================================================================

/// Short keys drawn from a small alphabet so that replacements happen often.
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,3}"
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..24)
}

fn ops_strategy() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::vec((key_strategy(), value_strategy()), 1..200)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: byte accounting matches the entries actually present.
    #[test]
    fn prop_used_bytes_matches_entries(
        max_bytes in 0u64..128,
        ops in ops_strategy(),
    ) {
        let mut cache = LruCache::new(max_bytes);
        let mut model: HashMap<String, usize> = HashMap::new();

        for (key, value) in ops {
            model.insert(key.clone(), value.len());
            cache.add(key, value);

            model.retain(|k, _| cache.contains(k));
            let expected: u64 = model.iter().map(|(k, v)| (k.len() + v) as u64).sum();

            prop_assert_eq!(cache.used_bytes(), expected);
            prop_assert_eq!(cache.len(), model.len());
            if max_bytes != 0 {
                prop_assert!(cache.used_bytes() <= max_bytes);
            }
        }
    }

    /// Property: the callback reports exactly the entries a reference
    /// recency list would evict, with their values, oldest first.
    #[test]
    fn prop_callback_reports_evictions_in_order(
        max_bytes in 1u64..64,
        ops in ops_strategy(),
    ) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut cache = LruCache::with_eviction_callback(max_bytes, move |key: &str, value: &Vec<u8>| {
            sink.lock().unwrap().push((key.to_string(), value.clone()));
        });

        // Most recently used at the front
        let mut model: VecDeque<(String, Vec<u8>)> = VecDeque::new();
        let mut expected = Vec::new();

        for (key, value) in ops {
            model.retain(|(k, _)| *k != key);
            model.push_front((key.clone(), value.clone()));
            while model_bytes(&model) > max_bytes {
                if let Some(oldest) = model.pop_back() {
                    expected.push(oldest);
                }
            }

            cache.add(key, value);

            prop_assert_eq!(&*evicted.lock().unwrap(), &expected);
            prop_assert_eq!(cache.len(), model.len());
        }
    }
}

fn model_bytes(model: &VecDeque<(String, Vec<u8>)>) -> u64 {
    model.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
}
