//! PeerCache - Distributed Read-Through Cache
//!
//! An in-process cache library for a fleet of identical nodes. Each key is
//! owned by exactly one node, chosen by a consistent hash ring; a node that
//! misses asks the owner over HTTP, and the owner falls back to a
//! user-supplied loader. Concurrent misses for the same key are coalesced
//! into a single load.
//!
//! # Architecture
//!
//! ```text
//! Group::get ─▶ LocalCache ─(miss)─▶ Coalescer ─▶ PeerPicker ─▶ HttpGetter ─▶ owner
//!                                          │                           │
//!                                          └────────── Loader ◀────────┘ (fallback)
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte-budgeted LRU and its thread-safe wrapper
//! - [`coalesce`] - Duplicate-call suppression
//! - [`error`] - Error types
//! - [`group`] - Named cache groups, loaders, statistics
//! - [`metrics`] - Prometheus exposition of group statistics
//! - [`peers`] - Peer selection and the HTTP peer protocol client
//! - [`ring`] - Consistent hash ring
//! - [`server`] - Inbound peer server and front API

pub mod cache;
pub mod coalesce;
pub mod error;
pub mod group;
pub mod metrics;
pub mod peers;
pub mod ring;
pub mod server;

// Re-export commonly used types
pub use cache::ByteView;
pub use coalesce::Coalescer;
pub use error::{Error, Result};
pub use group::{loader_fn, Group, GroupRegistry, Loader, StaticLoader};
pub use peers::{HttpPool, PeerGetter, PeerPicker, PoolConfig};
pub use ring::HashRing;
