//! Peer Wire Protocol
//!
//! # Request
//!
//! `GET <base_path><url-encoded group>/<url-encoded key>`, no body.
//!
//! # Response
//!
//! `200 OK`, `Content-Type: application/octet-stream`, body is a protobuf
//! encoded [`Response`]:
//!
//! ```protobuf
//! message Request {
//!   string group = 1;
//!   string key = 2;
//! }
//!
//! message Response {
//!   bytes value = 1;
//! }
//! ```
//!
//! Errors are plain text: 400 for a malformed path, 404 for an unknown
//! group, 500 when the local read fails.

use prost::Message;

use crate::error::{Error, Result};

/// Content type of a successful peer response
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// A `(group, key)` lookup addressed to a peer
#[derive(Clone, PartialEq, Message)]
pub struct Request {
    #[prost(string, tag = "1")]
    pub group: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

/// A peer's answer
#[derive(Clone, PartialEq, Message)]
pub struct Response {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
}

impl Request {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }

    /// Path for this request under `base_path` (which ends in `/`)
    pub fn to_path(&self, base_path: &str) -> String {
        format!(
            "{}{}/{}",
            base_path,
            urlencoding::encode(&self.group),
            urlencoding::encode(&self.key)
        )
    }

    /// Decode a request path of the form `<base_path><group>/<key>`.
    ///
    /// The key may itself contain encoded or literal `/`; only the first
    /// separator splits group from key.
    pub fn from_path(base_path: &str, path: &str) -> Result<Self> {
        let rest = path
            .strip_prefix(base_path)
            .ok_or_else(|| Error::BadRequest(format!("unexpected path: {}", path)))?;

        let (group, key) = rest
            .split_once('/')
            .ok_or_else(|| Error::BadRequest(format!("expected <group>/<key>: {}", path)))?;

        Ok(Self {
            group: decode_segment(group)?,
            key: decode_segment(key)?,
        })
    }
}

impl Response {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Encode into a freshly allocated buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decode from a response body
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        Ok(Self::decode(body)?)
    }
}

fn decode_segment(segment: &str) -> Result<String> {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .map_err(|e| Error::BadRequest(format!("invalid encoding in {:?}: {}", segment, e)))
}

// =============================================================================
// Tests
// =============================================================================
