//! Engine-side error types.

use thiserror::Error;

/// Memory arena errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArenaError {
    #[error("out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: u64, available: u64 },

    #[error("access out of bounds: {len} bytes at {addr:#x} (memory size {size})")]
    OutOfBounds { addr: u64, len: u64, size: u64 },

    #[error("invalid free of {0:#x}")]
    InvalidFree(u64),
}

/// Failure of a single engine call. Reported to the caller as a remote fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineFault {
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("bad argument {index} for '{op}': {reason}")]
    BadArgument {
        op: String,
        index: usize,
        reason: String,
    },

    #[error(transparent)]
    Memory(#[from] ArenaError),

    #[error("invalid handle {0}")]
    InvalidHandle(u64),

    #[error("{0}")]
    Failed(String),

    #[error("engine panicked: {0}")]
    Panicked(String),
}
