//! # ZK Types - Shared Data Model for the Pooled Prover
//!
//! Everything that crosses the boundary between the orchestrating side and an
//! execution context lives here:
//!
//! - [`Value`]: the raw numeric/byte calling convention of the engine
//! - [`CapabilityDescriptor`]: the fixed set of named operations an engine exposes
//! - [`CorrelationId`]: the tag that links a request to its response
//! - [`wire`]: request/response frames and their binary codec
//!
//! ## Frame Flow
//!
//! ```text
//! ┌──────────────────┐   HostFrame::Request    ┌───────────────────┐
//! │ Transport Client │ ──────────────────────→ │ Execution Context │
//! │                  │ ←────────────────────── │  (engine + arena) │
//! └──────────────────┘   WorkerFrame::Response └───────────────────┘
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod capability;
pub mod correlation;
pub mod value;
pub mod wire;

pub use capability::{CapabilityDescriptor, OpSpec};
pub use correlation::{CorrelationCounter, CorrelationId};
pub use value::{Value, ValueKind};
pub use wire::{CodecError, HostFrame, RemoteFault, Request, Response, WorkerFrame};

/// Reserved control operation every execution context must support.
///
/// Invoked with no arguments; acknowledged with [`Value::Unit`] right before
/// the context tears itself down.
pub const DESTROY_OP: &str = "__destroy_worker__";

/// Host-reserved operation: allocate `size` bytes in the context's arena.
pub const ALLOC_OP: &str = "bbmalloc";

/// Host-reserved operation: release a previous allocation.
pub const FREE_OP: &str = "bbfree";

/// Host-reserved operation: copy a byte payload into the arena at an address.
pub const WRITE_MEMORY_OP: &str = "write_memory";

/// Host-reserved operation: copy `len` bytes out of the arena.
pub const READ_MEMORY_OP: &str = "read_memory";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names_are_distinct() {
        let names = [DESTROY_OP, ALLOC_OP, FREE_OP, WRITE_MEMORY_OP, READ_MEMORY_OP];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
