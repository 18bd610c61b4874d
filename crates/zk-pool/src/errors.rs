//! Pool and pooled-operation error types.

use crate::pool::PoolState;
use std::ops::Range;
use thiserror::Error;
use zk_dispatch::DispatchError;

/// Errors raised by the worker pool and the pooled task runner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// An execution context failed to come up. The pool is unusable.
    #[error("pool initialization failed at slot {slot}: {reason}")]
    PoolInit { slot: usize, reason: String },

    #[error("pool is {actual}, expected {expected}")]
    InvalidState {
        expected: PoolState,
        actual: PoolState,
    },

    /// A partitioned operation was invoked before its `init` phase.
    #[error("{0} used before init")]
    NotInitialized(&'static str),

    /// One partition of a bulk operation failed; sibling results were discarded.
    #[error("sub-task '{op}' over {range:?} on slot {slot} failed: {source}")]
    SubtaskFailed {
        op: String,
        range: Range<usize>,
        slot: usize,
        source: DispatchError,
    },

    /// A sub-task answered with a payload of the wrong shape.
    #[error("sub-task '{op}' over {range:?} returned a malformed result: {reason}")]
    MalformedResult {
        op: String,
        range: Range<usize>,
        reason: String,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}

impl PoolError {
    /// Slot named by the error, if any.
    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        match self {
            PoolError::PoolInit { slot, .. } | PoolError::SubtaskFailed { slot, .. } => Some(*slot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zk_transport::TransportError;

    #[test]
    fn test_subtask_message_names_range_and_slot() {
        let err = PoolError::SubtaskFailed {
            op: "fft_merge_range".into(),
            range: 6..9,
            slot: 2,
            source: DispatchError::Transport(TransportError::Closed),
        };
        assert_eq!(
            err.to_string(),
            "sub-task 'fft_merge_range' over 6..9 on slot 2 failed: transport closed"
        );
        assert_eq!(err.slot(), Some(2));
        assert!(std::error::Error::source(&err).is_some());
    }
}
