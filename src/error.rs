//! Error types for the peer cache

use hyper::StatusCode;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the peer cache.
///
/// `Clone` so that one coalesced load result can be handed to every waiter.
/// Foreign errors are carried in their rendered form for that reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// Caller supplied an unusable argument (e.g. an empty key)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Data source has no value for the key
    #[error("{0} not exist")]
    KeyNotFound(String),

    /// Data source failed; the message is surfaced verbatim
    #[error("{0}")]
    Load(String),

    /// Malformed inbound request
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Inbound request used an unsupported method
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Named group is not registered
    #[error("no such group: {0}")]
    GroupNotFound(String),

    // =========================================================================
    // Peer Errors
    // =========================================================================
    /// Peer could not be reached or the body could not be read
    #[error("peer {peer} request failed: {reason}")]
    PeerRequest { peer: String, reason: String },

    /// Peer answered with a non-success status
    #[error("peer {peer} returned: {status}")]
    PeerStatus { peer: String, status: String },

    /// Wire payload could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// A group with this name already exists in the registry
    #[error("group already registered: {0}")]
    GroupExists(String),

    /// `register_peers` was called more than once on a group
    #[error("peer picker already registered for group: {0}")]
    PeerPickerAlreadyRegistered(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a data-source miss
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::KeyNotFound(key.into())
    }

    /// Status code reported to a remote caller for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::GroupNotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors raised while wiring a node together, as opposed to
    /// errors raised while serving a request.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::GroupExists(_) | Error::PeerPickerAlreadyRegistered(_) | Error::Config(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<prometheus::Error> for Error {
    fn from(e: prometheus::Error) -> Self {
        Error::Internal(format!("metrics: {}", e))
    }
}
