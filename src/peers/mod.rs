//! Peer Retrieval
//!
//! Capabilities a [`Group`](crate::group::Group) uses to reach other nodes,
//! and their HTTP implementation.
//!
//! # Architecture
//!
//! ```text
//! Group ──pick_peer(key)──▶ PeerPicker (HttpPool: HashRing + peer table)
//!   │                            │
//!   │◀──── Arc<dyn PeerGetter> ──┘
//!   │
//!   └──get(group, key)──▶ HttpGetter ──GET <base>/<group>/<key>──▶ remote node
//! ```
//!
//! The ring decides *which* peer owns a key; the getter decides *how* to
//! reach it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

mod client;
mod pool;
pub mod protocol;

pub use client::HttpGetter;
pub use pool::{normalize_peer_url, HttpPool, PoolConfig, DEFAULT_BASE_PATH};

/// Fetches a value for `(group, key)` from one specific peer.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Ask the peer for the bytes of `key` in `group`
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;

    /// Identity of the peer, for logging
    fn peer_id(&self) -> &str;
}

/// Resolves the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// The owning peer, or `None` when the key belongs to this node or no
    /// peers are configured
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
