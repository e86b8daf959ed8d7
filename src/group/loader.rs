//! Fallback Loader
//!
//! The authoritative data source consulted on a full cache miss.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Loads the bytes for a key from the source of truth.
///
/// Implement it on a stateful type (a database handle, an HTTP client), or
/// wrap a plain closure with [`loader_fn`].
#[async_trait]
pub trait Loader: Send + Sync {
    /// Fetch the value for `key`
    async fn load(&self, key: &str) -> Result<Vec<u8>>;
}

/// Adapter turning a synchronous closure into a [`Loader`]
pub struct LoaderFn<F>(F);

/// Wrap `f` as a [`Loader`]
pub fn loader_fn<F>(f: F) -> LoaderFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    LoaderFn(f)
}

#[async_trait]
impl<F> Loader for LoaderFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        (self.0)(key)
    }
}

/// Fixed in-memory table, used by the demo node and tests
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    data: HashMap<String, String>,
}

impl StaticLoader {
    /// Create a loader serving `data`
    pub fn new(data: HashMap<String, String>) -> Self {
        Self { data }
    }

    /// Number of keys served
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for StaticLoader
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[async_trait]
impl Loader for StaticLoader {
    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        tracing::debug!(key, "searching static table");
        self.data
            .get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| Error::not_found(key))
    }
}
