//! Group Statistics
//!
//! Lock-free counters describing one group's read path.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-group counters
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    server_requests: AtomicU64,
}

/// Point-in-time copy of [`GroupStats`] plus cache occupancy
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub group: String,
    pub gets: u64,
    pub cache_hits: u64,
    /// `cache_hits / gets`, 0 before the first get
    pub hit_ratio: f64,
    pub loads: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
    pub server_requests: u64,
    pub evictions: u64,
    pub cache_bytes: u64,
    pub cache_items: u64,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A coalesced computation actually started
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_error(&self) {
        self.local_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn peer_loads(&self) -> u64 {
        self.peer_loads.load(Ordering::Relaxed)
    }

    pub fn peer_errors(&self) -> u64 {
        self.peer_errors.load(Ordering::Relaxed)
    }

    pub fn local_loads(&self) -> u64 {
        self.local_loads.load(Ordering::Relaxed)
    }

    pub fn local_load_errors(&self) -> u64 {
        self.local_load_errors.load(Ordering::Relaxed)
    }

    pub fn server_requests(&self) -> u64 {
        self.server_requests.load(Ordering::Relaxed)
    }

    /// Hit ratio over all gets (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets() as f64;
        if gets == 0.0 {
            0.0
        } else {
            self.cache_hits() as f64 / gets
        }
    }

    /// Copy the counters out
    pub fn snapshot(&self, group: &str) -> StatsSnapshot {
        StatsSnapshot {
            group: group.to_string(),
            gets: self.gets(),
            cache_hits: self.cache_hits(),
            hit_ratio: self.hit_ratio(),
            loads: self.loads(),
            peer_loads: self.peer_loads(),
            peer_errors: self.peer_errors(),
            local_loads: self.local_loads(),
            local_load_errors: self.local_load_errors(),
            server_requests: self.server_requests(),
            ..Default::default()
        }
    }
}
