//! Wire frames exchanged over a transport channel.
//!
//! The host side sends [`HostFrame`]s; the execution context answers with
//! [`WorkerFrame`]s. Both are encoded with `bincode`. A frame that fails to
//! decode is malformed and must be dropped by the receiver.

use crate::correlation::CorrelationId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A call issued to an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique among the issuing client's in-flight calls.
    pub id: CorrelationId,
    /// Operation name.
    pub op: String,
    /// Ordered arguments.
    pub args: Vec<Value>,
}

/// Failure reported by the remote engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("remote operation '{op}' failed: {message}")]
pub struct RemoteFault {
    /// Operation that failed.
    pub op: String,
    /// Engine-provided description.
    pub message: String,
}

impl RemoteFault {
    pub fn new(op: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            message: message.into(),
        }
    }
}

/// The answer to exactly one [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Correlation id copied from the request.
    pub id: CorrelationId,
    /// Result value or remote failure.
    pub outcome: Result<Value, RemoteFault>,
}

/// Frames travelling from the host to an execution context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostFrame {
    Request(Request),
}

/// Frames travelling from an execution context back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerFrame {
    /// The engine instance is constructed and accepting requests.
    Ready {
        /// Engine name reported by the instance.
        engine: String,
    },
    /// The engine instance could not be constructed; the context is exiting.
    InitFailed { reason: String },
    /// Answer to a request.
    Response(Response),
}

/// Frame encoding/decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode frame: {0}")]
    Encode(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),
}

impl HostFrame {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

impl WorkerFrame {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
