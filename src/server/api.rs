//! Front API
//!
//! Client-facing endpoints of a node:
//!
//! - `GET /api?key=<key>` - read through the node's group (raw bytes)
//! - `GET /healthz`, `/livez`, `/readyz` - liveness and readiness
//! - `GET /stats` - group counters as JSON
//! - `GET /metrics` - group counters in Prometheus text format

use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, StatusCode, Uri};
use tracing::error;

use super::{error_response, ok, text, Handler, HttpResponse};
use crate::error::{Error, Result};
use crate::group::{Group, GroupRegistry};
use crate::metrics;

/// Handler for client requests
pub struct ApiHandler {
    registry: Arc<GroupRegistry>,
    group: Arc<Group>,
}

impl ApiHandler {
    /// Serve `/api` from `group`; stats cover every group in `registry`
    pub fn new(registry: Arc<GroupRegistry>, group: Arc<Group>) -> Self {
        Self { registry, group }
    }

    async fn get_value(&self, uri: &Uri) -> HttpResponse {
        let key = match query_param(uri, "key") {
            Ok(Some(key)) => key,
            Ok(None) => {
                return error_response(&Error::BadRequest("missing query parameter: key".into()))
            }
            Err(e) => return error_response(&e),
        };

        match self.group.get(&key).await {
            Ok(value) => ok("application/octet-stream", value.bytes()),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn stats(&self) -> HttpResponse {
        let snapshots: Vec<_> = self.registry.groups().iter().map(|g| g.snapshot()).collect();
        match serde_json::to_vec(&snapshots) {
            Ok(body) => ok("application/json", body),
            Err(e) => error_response(&Error::Internal(e.to_string())),
        }
    }

    fn metrics(&self) -> HttpResponse {
        match metrics::render(&self.registry) {
            Ok(body) => ok(metrics::CONTENT_TYPE, body),
            Err(e) => {
                error!(error = %e, "failed to render metrics");
                error_response(&e)
            }
        }
    }
}

#[async_trait]
impl Handler for ApiHandler {
    async fn handle(&self, method: &Method, uri: &Uri) -> HttpResponse {
        if method != Method::GET {
            return error_response(&Error::MethodNotAllowed(method.to_string()));
        }

        match uri.path() {
            "/api" => self.get_value(uri).await,
            "/healthz" | "/livez" | "/readyz" => text(StatusCode::OK, "ok"),
            "/stats" => self.stats(),
            "/metrics" => self.metrics(),
            _ => text(StatusCode::NOT_FOUND, "not found"),
        }
    }
}

/// First value of `name` in the query string, form-decoded
fn query_param(uri: &Uri, name: &str) -> Result<Option<String>> {
    let Some(query) = uri.query() else {
        return Ok(None);
    };

    for pair in query.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k == name {
            let v = v.replace('+', " ");
            return urlencoding::decode(&v)
                .map(|s| Some(s.into_owned()))
                .map_err(|e| Error::BadRequest(format!("invalid encoding for {}: {}", name, e)));
        }
    }
    Ok(None)
}

// =============================================================================
// Tests
// =============================================================================
