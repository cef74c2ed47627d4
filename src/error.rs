//! Error types for the mesh gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the mesh gateway
///
/// The first group is the gateway's own REST taxonomy and maps one-to-one
/// onto transport status codes (see [`crate::rest::HttpStatus`]). The rest are
/// ambient failures that surface as internal errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range caller input
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// Operation not permitted in the current mesh state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Requested sub-resource is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Library or engine failure with no corrective action
    #[error("internal error: {0}")]
    Internal(String),

    /// Mesh library ran out of buffers
    #[error("insufficient storage: {0}")]
    InsufficientStorage(String),

    /// Transport gave up waiting for a response; raised by the HTTP adaptor only
    #[error("request timed out")]
    Timeout,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an invalid-arguments error
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    /// Shorthand for an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Shorthand for an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
