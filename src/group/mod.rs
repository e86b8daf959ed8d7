//! Cache Groups
//!
//! A [`Group`] is one cache namespace: a local LRU, a fallback loader, an
//! optional peer picker, and request coalescing tying them together.
//!
//! # Read Path
//!
//! ```text
//! get(key)
//!   ├─ empty key ───────────────────────────▶ InvalidArgument
//!   ├─ local hit ───────────────────────────▶ value
//!   └─ miss ─▶ coalesce(key)
//!                ├─ peer picked ─▶ remote fetch ──ok──▶ value (not cached)
//!                │                      └─err─▶ fall through
//!                └─ local load ─▶ loader ─▶ cache ─▶ value
//! ```
//!
//! Only the node that went to the loader keeps the value; a peer-served value
//! is returned without being cached so hot keys are not stored on every node.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ByteView, LocalCache};
use crate::coalesce::Coalescer;
use crate::error::{Error, Result};
use crate::peers::{PeerGetter, PeerPicker};

mod loader;
mod registry;
mod stats;

pub use loader::{loader_fn, Loader, LoaderFn, StaticLoader};
pub use registry::GroupRegistry;
pub use stats::{GroupStats, StatsSnapshot};

/// One cache namespace
pub struct Group {
    shared: Arc<Shared>,
}

/// Group state, shared with loads running on their own tasks
struct Shared {
    name: String,
    main_cache: LocalCache,
    loader: Arc<dyn Loader>,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    /// Coalesces the whole miss path (peer or local)
    flight: Coalescer<ByteView>,
    /// Coalesces loader calls, shared by the miss path and inbound peer requests
    local_flight: Coalescer<ByteView>,
    stats: GroupStats,
}

impl Group {
    /// Create a group with a `max_bytes` local cache (`0` = unbounded).
    ///
    /// Most callers go through [`GroupRegistry::new_group`] so the group can
    /// be found by inbound peer requests.
    pub fn new(name: impl Into<String>, max_bytes: u64, loader: Arc<dyn Loader>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                main_cache: LocalCache::new(max_bytes),
                loader,
                peers: OnceCell::new(),
                flight: Coalescer::new(),
                local_flight: Coalescer::new(),
                stats: GroupStats::new(),
            }),
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Attach the peer picker. May be called once per group.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.shared
            .peers
            .set(peers)
            .map_err(|_| Error::PeerPickerAlreadyRegistered(self.shared.name.clone()))?;
        info!(group = %self.shared.name, "registered peer picker");
        Ok(())
    }

    /// Read a value: local cache, then the owning peer, then the loader.
    ///
    /// Dropping the returned future does not cancel the load it started;
    /// the value is still cached when it arrives.
    #[instrument(skip(self), fields(group = %self.shared.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.shared.stats.record_get();
        validate_key(key)?;

        if let Some(value) = self.shared.lookup_cache(key) {
            return Ok(value);
        }
        Arc::clone(&self.shared).load(key).await
    }

    /// Read a value without consulting peers.
    ///
    /// Serves inbound peer requests: the asking node already decided this
    /// node owns the key, so forwarding again could loop.
    #[instrument(skip(self), fields(group = %self.shared.name))]
    pub async fn get_local(&self, key: &str) -> Result<ByteView> {
        self.shared.stats.record_get();
        validate_key(key)?;

        if let Some(value) = self.shared.lookup_cache(key) {
            return Ok(value);
        }
        Arc::clone(&self.shared).load_locally(key).await
    }

    /// Counters for this group
    pub fn stats(&self) -> &GroupStats {
        &self.shared.stats
    }

    /// Counters plus cache occupancy
    pub fn snapshot(&self) -> StatsSnapshot {
        let cache = &self.shared.main_cache;
        StatsSnapshot {
            evictions: cache.evictions(),
            cache_bytes: cache.used_bytes(),
            cache_items: cache.len() as u64,
            ..self.shared.stats.snapshot(&self.shared.name)
        }
    }

    /// Number of locally cached entries
    pub fn cache_len(&self) -> usize {
        self.shared.main_cache.len()
    }

    /// Bytes held by the local cache
    pub fn cache_bytes(&self) -> u64 {
        self.shared.main_cache.used_bytes()
    }
}

impl Shared {
    fn lookup_cache(&self, key: &str) -> Option<ByteView> {
        let value = self.main_cache.get(key)?;
        self.stats.record_cache_hit();
        debug!(group = %self.name, key, "cache hit");
        Some(value)
    }

    async fn load(self: Arc<Self>, key: &str) -> Result<ByteView> {
        let compute = {
            let shared = Arc::clone(&self);
            let key = key.to_string();
            move || shared.fetch(key)
        };
        self.flight.run(key, compute).await
    }

    /// One coalesced miss: the owning peer first, the loader as fallback
    async fn fetch(self: Arc<Self>, key: String) -> Result<ByteView> {
        self.stats.record_load();

        if let Some(peer) = self.peers.get().and_then(|p| p.pick_peer(&key)) {
            match self.get_from_peer(peer.as_ref(), &key).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    self.stats.record_peer_error();
                    warn!(
                        group = %self.name,
                        key,
                        peer = peer.peer_id(),
                        error = %e,
                        "failed to get from peer, loading locally"
                    );
                }
            }
        }

        self.load_locally(&key).await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.get(&self.name, key).await?;
        self.stats.record_peer_load();
        Ok(ByteView::from(bytes))
    }

    async fn load_locally(self: Arc<Self>, key: &str) -> Result<ByteView> {
        let compute = {
            let shared = Arc::clone(&self);
            let key = key.to_string();
            move || shared.load_from_source(key)
        };
        self.local_flight.run(key, compute).await
    }

    async fn load_from_source(self: Arc<Self>, key: String) -> Result<ByteView> {
        let bytes = match self.loader.load(&key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_local_load_error();
                return Err(e);
            }
        };
        self.stats.record_local_load();

        let value = ByteView::copy_from_slice(&bytes);
        self.populate_cache(&key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.shared.name)
            .field("max_bytes", &self.shared.main_cache.max_bytes())
            .field("has_peers", &self.shared.peers.get().is_some())
            .finish()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("key is required".into()));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn db() -> HashMap<&'static str, &'static str> {
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
    }

    /// Loader over `db()` that counts calls per key.
    fn counting_loader(counts: Arc<Mutex<HashMap<String, usize>>>) -> Arc<dyn Loader> {
        Arc::new(loader_fn(move |key| {
            let db = db();
            match db.get(key) {
                Some(v) => {
                    *counts.lock().entry(key.to_string()).or_default() += 1;
                    Ok(v.as_bytes().to_vec())
                }
                None => Err(Error::not_found(key)),
            }
        }))
    }

    struct FixedPeer {
        reply: Result<Vec<u8>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PeerGetter for FixedPeer {
        async fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }

        fn peer_id(&self) -> &str {
            "http://fixed-peer"
        }
    }

    struct AlwaysPick(Arc<FixedPeer>);

    impl PeerPicker for AlwaysPick {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(self.0.clone())
        }
    }

    struct NeverPick;

    impl PeerPicker for NeverPick {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            None
        }
    }

    fn fixed_peer(reply: Result<Vec<u8>>) -> Arc<FixedPeer> {
        Arc::new(FixedPeer {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_get_loads_once_then_hits_cache() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts.clone()));

        for (k, v) in db() {
            let view = group.get(k).await.unwrap();
            assert_eq!(view.to_string(), v);

            let again = group.get(k).await.unwrap();
            assert_eq!(again, view);
            assert_eq!(counts.lock()[k], 1, "cache miss for {}", k);
        }
        assert_eq!(group.stats().cache_hits(), 3);
    }

    #[tokio::test]
    async fn test_unknown_key_is_error_and_not_cached() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts));

        let result = group.get("unknown").await;

        assert_matches!(result, Err(Error::KeyNotFound(ref k)) if k == "unknown");
        assert_eq!(group.cache_len(), 0);
        assert_eq!(group.stats().local_load_errors(), 1);
    }

    #[tokio::test]
    async fn test_empty_key_is_invalid_and_skips_loader() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts.clone()));

        assert_matches!(group.get("").await, Err(Error::InvalidArgument(_)));
        assert_matches!(group.get_local("").await, Err(Error::InvalidArgument(_)));
        assert!(counts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_register_peers_twice_is_rejected() {
        let group = Group::new("scores", 0, Arc::new(StaticLoader::default()));

        assert!(group.register_peers(Arc::new(NeverPick)).is_ok());
        let err = group.register_peers(Arc::new(NeverPick)).unwrap_err();

        assert_matches!(err, Error::PeerPickerAlreadyRegistered(ref g) if g == "scores");
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_peer_value_is_returned_but_not_cached() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts.clone()));
        let peer = fixed_peer(Ok(b"from-peer".to_vec()));
        group
            .register_peers(Arc::new(AlwaysPick(peer.clone())))
            .unwrap();

        let view = group.get("Tom").await.unwrap();
        assert_eq!(view.to_string(), "from-peer");
        assert_eq!(group.cache_len(), 0);
        assert!(counts.lock().is_empty());

        group.get("Tom").await.unwrap();
        assert_eq!(peer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(group.stats().peer_loads(), 2);
    }

    #[tokio::test]
    async fn test_peer_failure_falls_back_to_loader() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts.clone()));
        let peer = fixed_peer(Err(Error::PeerStatus {
            peer: "http://fixed-peer".into(),
            status: "500 Internal Server Error".into(),
        }));
        group
            .register_peers(Arc::new(AlwaysPick(peer.clone())))
            .unwrap();

        let view = group.get("Jack").await.unwrap();

        assert_eq!(view.to_string(), "589");
        assert_eq!(group.cache_len(), 1);
        assert_eq!(group.stats().peer_errors(), 1);
        assert_eq!(counts.lock()["Jack"], 1);
    }

    #[tokio::test]
    async fn test_get_local_never_asks_peers() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts));
        let peer = fixed_peer(Ok(b"from-peer".to_vec()));
        group
            .register_peers(Arc::new(AlwaysPick(peer.clone())))
            .unwrap();

        let view = group.get_local("Sam").await.unwrap();

        assert_eq!(view.to_string(), "567");
        assert_eq!(peer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(group.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_no_peer_picked_loads_locally() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts.clone()));
        group.register_peers(Arc::new(NeverPick)).unwrap();

        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
        assert_eq!(counts.lock()["Tom"], 1);
    }

    struct SlowLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Loader for SlowLoader {
        async fn load(&self, key: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(format!("value-of-{}", key).into_bytes())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_are_coalesced() {
        let loader = Arc::new(SlowLoader {
            calls: AtomicUsize::new(0),
        });
        let group = Arc::new(Group::new("slow", 0, loader.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let group = Arc::clone(&group);
                tokio::spawn(async move { group.get("hot").await })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().to_string(), "value-of-hot");
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_get_still_caches_value() {
        let loader = Arc::new(SlowLoader {
            calls: AtomicUsize::new(0),
        });
        let group = Group::new("slow", 0, loader.clone());

        let abandoned = tokio::time::timeout(Duration::from_millis(20), group.get("k")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(group.cache_len(), 1);

        assert_eq!(group.get("k").await.unwrap().to_string(), "value-of-k");
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().cache_hits(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_remote_fetch_completes() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts));
        let peer = Arc::new(SlowPeer {
            calls: AtomicUsize::new(0),
        });
        group.register_peers(Arc::new(SlowPick(peer.clone()))).unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(20), group.get("Tom")).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(group.stats().peer_loads(), 1);
    }

    struct SlowPeer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PeerGetter for SlowPeer {
        async fn get(&self, _group: &str, key: &str) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("remote-{}", key).into_bytes())
        }

        fn peer_id(&self) -> &str {
            "http://slow-peer"
        }
    }

    struct SlowPick(Arc<SlowPeer>);

    impl PeerPicker for SlowPick {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_snapshot_includes_cache_occupancy() {
        let counts = Arc::new(Mutex::new(HashMap::new()));
        let group = Group::new("scores", 2 << 10, counting_loader(counts));
        group.get("Tom").await.unwrap();

        let snapshot = group.snapshot();
        assert_eq!(snapshot.group, "scores");
        assert_eq!(snapshot.cache_items, 1);
        assert_eq!(snapshot.cache_bytes, 6);
        assert_eq!(snapshot.local_loads, 1);
    }
}
