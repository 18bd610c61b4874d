//! # ZK Pool - Worker Pool and Pooled Operations
//!
//! Owns N execution contexts and fans bulk numeric work out across them.
//!
//! ## Components
//!
//! - [`WorkerPool`]: lifecycle of the ordered slot set
//! - [`partition`]: contiguous split of a domain across slots
//! - [`PooledTaskRunner`]: one sub-task per slot, merge keyed by sub-range
//! - [`PooledPippenger`]: MSM, reduced by point addition
//! - [`PooledFft`]: FFT, reduced by positional scatter
//!
//! ## Flow
//!
//! ```text
//! caller ──→ PooledFft::fft ──→ partition(n, slots)
//!                                   │
//!             ┌─────────────────────┼─────────────────────┐
//!             ↓                     ↓                     ↓
//!        slot 0 proxy          slot 1 proxy   ...    slot k proxy
//!             │                     │                     │
//!             └──────── results keyed by sub-range ───────┘
//!                                   ↓
//!                               reduction
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod errors;
pub mod fft;
pub mod partition;
pub mod pippenger;
pub mod pool;
pub mod runner;

pub use config::{PoolConfig, DEFAULT_POOL_SIZE, MAX_POOL_SIZE};
pub use errors::PoolError;
pub use fft::PooledFft;
pub use partition::partition;
pub use pippenger::PooledPippenger;
pub use pool::{PoolSlot, PoolState, WorkerPool};
pub use runner::{PooledTaskRunner, SubResult, SubTask};
