//! HTTP Peer Getter
//!
//! Outbound half of the peer protocol: one instance per remote node.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::protocol::{Request, Response};
use super::PeerGetter;
use crate::error::{Error, Result};

/// Fetches values from one remote node over HTTP
#[derive(Clone)]
pub struct HttpGetter {
    /// Remote node's base URL, e.g. `http://10.0.0.2:8001`
    peer: String,
    /// `peer` + base path, e.g. `http://10.0.0.2:8001/_cache/`
    base_url: String,
    client: Client,
}

impl HttpGetter {
    /// Create a getter for `peer` sharing an existing client
    pub fn new(peer: impl Into<String>, base_path: &str, client: Client) -> Self {
        let peer = peer.into();
        let base_url = format!("{}{}", peer.trim_end_matches('/'), base_path);
        Self {
            peer,
            base_url,
            client,
        }
    }

    /// Full URL the getter requests for `(group, key)`
    pub fn url_for(&self, group: &str, key: &str) -> String {
        Request::new(group, key).to_path(&self.base_url)
    }
}

impl std::fmt::Debug for HttpGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGetter")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    #[instrument(skip(self), fields(peer = %self.peer))]
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url_for(group, key);
        debug!(%url, "fetching from peer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::PeerRequest {
                peer: self.peer.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::PeerStatus {
                peer: self.peer.clone(),
                status: response.status().to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::PeerRequest {
            peer: self.peer.clone(),
            reason: format!("reading response body: {}", e),
        })?;

        Ok(Response::from_bytes(&body)?.value)
    }

    fn peer_id(&self) -> &str {
        &self.peer
    }
}
