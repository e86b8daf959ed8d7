//! Prometheus Exposition
//!
//! Renders every group's counters in the Prometheus text format. A fresh
//! registry is built per scrape from the live atomics, so nothing has to be
//! kept in sync between the read path and the exporter.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::group::{GroupRegistry, StatsSnapshot};

/// Content type of [`render`]'s output
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

type Field = fn(&StatsSnapshot) -> u64;

/// Encode all group statistics
pub fn render(groups: &GroupRegistry) -> Result<Vec<u8>> {
    let snapshots: Vec<StatsSnapshot> = groups.groups().iter().map(|g| g.snapshot()).collect();
    let registry = Registry::new();

    let counters: [(&str, &str, Field); 9] = [
        ("peercache_gets_total", "Get requests, including inbound peer requests", |s| s.gets),
        ("peercache_cache_hits_total", "Gets served from the local cache", |s| s.cache_hits),
        ("peercache_loads_total", "Coalesced loads started after a cache miss", |s| s.loads),
        ("peercache_peer_loads_total", "Values fetched from a remote peer", |s| s.peer_loads),
        ("peercache_peer_errors_total", "Failed remote peer fetches", |s| s.peer_errors),
        ("peercache_local_loads_total", "Values produced by the fallback loader", |s| s.local_loads),
        ("peercache_local_load_errors_total", "Fallback loader failures", |s| s.local_load_errors),
        ("peercache_server_requests_total", "Inbound peer requests served", |s| s.server_requests),
        ("peercache_evictions_total", "Entries evicted from the local cache", |s| s.evictions),
    ];

    for (name, help, field) in counters {
        let vec = IntCounterVec::new(Opts::new(name, help), &["group"])?;
        registry.register(Box::new(vec.clone()))?;
        for snapshot in &snapshots {
            vec.with_label_values(&[snapshot.group.as_str()])
                .inc_by(field(snapshot));
        }
    }

    let gauges: [(&str, &str, Field); 2] = [
        ("peercache_cache_bytes", "Bytes held by the local cache", |s| s.cache_bytes),
        ("peercache_cache_items", "Entries held by the local cache", |s| s.cache_items),
    ];

    for (name, help, field) in gauges {
        let vec = IntGaugeVec::new(Opts::new(name, help), &["group"])?;
        registry.register(Box::new(vec.clone()))?;
        for snapshot in &snapshots {
            vec.with_label_values(&[snapshot.group.as_str()])
                .set(field(snapshot) as i64);
        }
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::StaticLoader;

    #[tokio::test]
    async fn test_render_includes_group_counters() {
        let groups = GroupRegistry::new();
        let loader: StaticLoader = [("Tom", "630")].into_iter().collect();
        let group = groups.new_group("scores", 1024, loader).unwrap();
        group.get("Tom").await.unwrap();
        group.get("Tom").await.unwrap();

        let text = String::from_utf8(render(&groups).unwrap()).unwrap();

        assert!(text.contains("peercache_gets_total{group=\"scores\"} 2"));
        assert!(text.contains("peercache_cache_hits_total{group=\"scores\"} 1"));
        assert!(text.contains("peercache_cache_bytes{group=\"scores\"} 6"));
    }

    #[test]
    fn test_render_empty_registry() {
        let groups = GroupRegistry::new();
        assert!(render(&groups).is_ok());
    }
}
