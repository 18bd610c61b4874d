//! Dispatch error types.

use thiserror::Error;
use zk_transport::TransportError;
use zk_types::ValueKind;

/// Errors raised by a dispatch proxy.
///
/// `UnknownOperation` and `ArityMismatch` are detected locally; nothing is
/// sent to the execution context in those cases.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("operation '{op}' is not declared by {engine}")]
    UnknownOperation { op: String, engine: &'static str },

    #[error("operation '{op}' takes {expected} arguments, got {actual}")]
    ArityMismatch {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("operation '{op}' returned {actual}, expected {expected}")]
    UnexpectedResult {
        op: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Whether the failure came from the remote engine itself.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, DispatchError::Transport(TransportError::Remote(_)))
    }
}
