//! Transport error types.

use std::time::Duration;
use thiserror::Error;
use zk_types::{CodecError, RemoteFault};

/// Errors surfaced by channels and transport clients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The channel or its execution context could not be brought up.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The client was closed before or while the call was in flight.
    #[error("transport closed")]
    Closed,

    /// The optional per-request deadline elapsed.
    #[error("request '{op}' timed out after {after:?}")]
    Timeout { op: String, after: Duration },

    /// The remote engine reported a failure.
    #[error(transparent)]
    Remote(#[from] RemoteFault),

    /// A frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(String),
}

impl TransportError {
    /// Short label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Unavailable(_) => "unavailable",
            TransportError::Closed => "closed",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Remote(_) => "remote",
            TransportError::Codec(_) => "codec",
        }
    }
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        TransportError::Codec(e.to_string())
    }
}
