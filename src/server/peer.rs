//! Inbound Peer Protocol
//!
//! Serves `GET <base_path><group>/<key>` from this node's own cache and
//! loader. An inbound request is never forwarded to another peer.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, Uri};
use tracing::{debug, warn};

use super::{error_response, ok, Handler, HttpResponse};
use crate::cache::ByteView;
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::peers::protocol::{self, Request};
use crate::peers::DEFAULT_BASE_PATH;

/// Handler for requests from other nodes
pub struct PeerHandler {
    registry: Arc<GroupRegistry>,
    base_path: String,
}

impl PeerHandler {
    /// Serve groups from `registry` under the default base path
    pub fn new(registry: Arc<GroupRegistry>) -> Self {
        Self::with_base_path(registry, DEFAULT_BASE_PATH)
    }

    /// Serve groups from `registry` under `base_path`
    pub fn with_base_path(registry: Arc<GroupRegistry>, base_path: impl Into<String>) -> Self {
        Self {
            registry,
            base_path: base_path.into(),
        }
    }

    /// Resolve and read the value a peer asked for
    pub async fn lookup(&self, method: &Method, path: &str) -> Result<ByteView> {
        if method != Method::GET {
            return Err(Error::MethodNotAllowed(method.to_string()));
        }

        let request = Request::from_path(&self.base_path, path)?;
        let group = self
            .registry
            .get_group(&request.group)
            .ok_or_else(|| Error::GroupNotFound(request.group.clone()))?;

        group.stats().record_server_request();
        group.get_local(&request.key).await
    }
}

#[async_trait]
impl Handler for PeerHandler {
    async fn handle(&self, method: &Method, uri: &Uri) -> HttpResponse {
        match self.lookup(method, uri.path()).await {
            Ok(value) => {
                debug!(path = uri.path(), bytes = value.len(), "served peer request");
                let body = protocol::Response::new(value.to_vec()).to_bytes();
                ok(protocol::CONTENT_TYPE, body)
            }
            Err(e) => {
                warn!(%method, path = uri.path(), error = %e, "peer request failed");
                error_response(&e)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
