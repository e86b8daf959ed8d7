//! HTTP Servers
//!
//! A small hyper accept loop shared by the peer server and the front API.
//! Handlers only see the method and URI; neither protocol carries a body.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub mod api;
pub mod peer;

pub use api::ApiHandler;
pub use peer::PeerHandler;

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

/// Request handler served by [`serve`]
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Produce a response; failures are rendered as responses, never raised
    async fn handle(&self, method: &Method, uri: &Uri) -> HttpResponse;
}

/// Bind a listener on `addr`
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid bind address {}: {}", addr, e)))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Io(format!("Failed to bind {}: {}", addr, e)))
}

/// Accept connections forever, one task per connection
pub async fn serve<H: Handler>(listener: TcpListener, handler: Arc<H>) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "server listening");

    loop {
        let (stream, remote) = listener
            .accept()
            .await
            .map_err(|e| Error::Io(format!("accept error on {}: {}", addr, e)))?;

        let io = TokioIo::new(stream);
        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                async move {
                    debug!(method = %req.method(), path = req.uri().path(), "request");
                    Ok::<_, Infallible>(handler.handle(req.method(), req.uri()).await)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%remote, error = %e, "connection error");
            }
        });
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Plain-text response
pub fn text(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    respond(status, "text/plain; charset=utf-8", body.into())
}

/// 200 response with an explicit content type
pub fn ok(content_type: &'static str, body: impl Into<Bytes>) -> HttpResponse {
    respond(StatusCode::OK, content_type, body.into())
}

/// Render an error with its mapped status and message
pub fn error_response(err: &Error) -> HttpResponse {
    text(err.http_status(), err.to_string())
}
