//! Local Cache Layer
//!
//! Byte-budgeted LRU storage for a single node, with no knowledge of peers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ LocalCache (parking_lot::Mutex, lazy init)     │
//! │  ┌─────────────────────────────────────────┐   │
//! │  │ LruCache<ByteView>                      │   │
//! │  │  HashMap<String, slot> + recency list   │   │
//! │  └─────────────────────────────────────────┘   │
//! └───────────────────────────────────────────────┘
//! ```

mod byteview;
mod local;
mod lru;
mod proptest;

pub use byteview::ByteView;
pub use local::LocalCache;
pub use lru::{EvictionCallback, LruCache, Weighted};
