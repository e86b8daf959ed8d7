//! HTTP Peer Pool
//!
//! Owns the hash ring and one [`HttpGetter`] per remote node. Implements
//! [`PeerPicker`] for the groups on this node; the inbound half of the
//! protocol lives in [`crate::server::peer`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use tracing::{debug, info};

use super::client::HttpGetter;
use super::{PeerGetter, PeerPicker};
use crate::error::{Error, Result};
use crate::ring::{HashRing, DEFAULT_REPLICAS};

/// Default URL prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_cache/";

/// Canonical form of a peer base URL, used as the node's ring identity.
///
/// Scheme and host are lowercased, a default port is dropped and trailing
/// slashes are removed, so `http://LOCALHOST:80/` and `http://localhost`
/// name the same node. Strings that do not parse as URLs are only trimmed.
pub fn normalize_peer_url(url: &str) -> String {
    let url = url.trim();
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.as_str().trim_end_matches('/').to_string(),
        Err(_) => url.trim_end_matches('/').to_string(),
    }
}

/// Configuration for the peer pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// URL prefix for peer requests; must start and end with `/`
    pub base_path: String,

    /// Virtual nodes per peer on the hash ring
    pub replicas: usize,

    /// Timeout for one peer round-trip
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    fn validate(&self) -> Result<()> {
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                self.base_path
            )));
        }
        if self.replicas == 0 {
            return Err(Error::Config("replicas must be at least 1".into()));
        }
        Ok(())
    }
}

/// Ring and peer table, replaced together on reconfiguration
struct PeerSet {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Peer selection and transport for one node
pub struct HttpPool {
    /// This node's base URL, e.g. `http://10.0.0.1:8001`
    self_url: String,
    config: PoolConfig,
    client: Client,
    peers: RwLock<PeerSet>,
}

impl HttpPool {
    /// Create a pool for the node reachable at `self_url`
    pub fn new(self_url: impl Into<String>) -> Result<Self> {
        Self::with_config(self_url, PoolConfig::default())
    }

    /// Create a pool with custom configuration
    pub fn with_config(self_url: impl Into<String>, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let self_url: String = self_url.into();
        Ok(Self {
            self_url: normalize_peer_url(&self_url),
            peers: RwLock::new(PeerSet {
                ring: HashRing::new(config.replicas),
                getters: HashMap::new(),
            }),
            config,
            client,
        })
    }

    /// Replace the peer set. `peers` are base URLs and may include this node;
    /// spellings of the same URL collapse to one peer.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for peer in peers {
            let peer = normalize_peer_url(peer.as_ref());
            if !peer.is_empty() && !unique.contains(&peer) {
                unique.push(peer);
            }
        }
        let peers = unique;

        let mut ring = HashRing::new(self.config.replicas);
        ring.add_nodes(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let getter = HttpGetter::new(peer.clone(), &self.config.base_path, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.peers.write() = PeerSet { ring, getters };
        info!(node = %self.self_url, peers = ?peers, "peer set updated");
    }

    /// This node's base URL, normalized
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// URL prefix served for peer requests
    pub fn base_path(&self) -> &str {
        &self.config.base_path
    }

    /// Node that owns `key` on the ring, possibly this one
    pub fn owner_of(&self, key: &str) -> Option<String> {
        self.peers.read().ring.pick_node(key).map(str::to_string)
    }

    /// Number of configured peers, including this node if listed
    pub fn peer_count(&self) -> usize {
        self.peers.read().getters.len()
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let peers = self.peers.read();
        let peer = peers.ring.pick_node(key)?;
        if peer == self.self_url {
            return None;
        }
        debug!(node = %self.self_url, peer, key, "picked peer");
        let getter = peers.getters.get(peer)?;
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("config", &self.config)
            .field("peers", &self.peer_count())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
