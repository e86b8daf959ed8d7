//! Group Registry
//!
//! Name → [`Group`] table owned by whoever bootstraps the node and shared
//! with the inbound servers. Lookups are per request; creation happens at
//! startup, so a read/write lock fits.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::{Group, Loader};
use crate::error::{Error, Result};

/// Registry of cache groups. Groups are never removed.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a group.
    ///
    /// Fails if `name` is empty or already registered.
    pub fn new_group<L>(&self, name: &str, max_bytes: u64, loader: L) -> Result<Arc<Group>>
    where
        L: Loader + 'static,
    {
        self.new_group_with(name, max_bytes, Arc::new(loader))
    }

    /// Like [`new_group`](Self::new_group) for an already shared loader
    pub fn new_group_with(
        &self,
        name: &str,
        max_bytes: u64,
        loader: Arc<dyn Loader>,
    ) -> Result<Arc<Group>> {
        if name.is_empty() {
            return Err(Error::Config("group name is required".into()));
        }

        let mut groups = self.groups.write();
        if groups.contains_key(name) {
            return Err(Error::GroupExists(name.to_string()));
        }

        let group = Arc::new(Group::new(name, max_bytes, loader));
        groups.insert(name.to_string(), Arc::clone(&group));
        info!(group = name, max_bytes, "created cache group");
        Ok(group)
    }

    /// Look up a group by name
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// All groups, ordered by name
    pub fn groups(&self) -> Vec<Arc<Group>> {
        let mut groups: Vec<_> = self.groups.read().values().cloned().collect();
        groups.sort_by(|a, b| a.name().cmp(b.name()));
        groups
    }

    /// Number of registered groups
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Check if no groups are registered
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}
