//! # ZK Engine - Execution Contexts
//!
//! An execution context is one engine instance plus its private linear memory
//! arena, running on a dedicated OS thread and reachable only through a
//! transport channel.
//!
//! ## Components
//!
//! - [`arena`]: [`MemoryArena`], the per-instance linear memory
//! - [`engine`]: [`Engine`] / [`EngineFactory`] contract
//! - [`host`]: [`spawn_context`] and the context serve loop
//! - [`reference`]: [`ReferenceImage`], a Goldilocks-field engine with
//!   Pippenger MSM and radix-2 FFT
//!
//! ## Isolation
//!
//! Contexts share nothing. Constant data (point tables, domains) is copied
//! into each arena separately, and every request against an arena arrives
//! through that context's own channel.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod arena;
pub mod engine;
pub mod errors;
pub mod host;
pub mod reference;

pub use arena::{MemoryArena, ALIGN, DEFAULT_ARENA_CAPACITY};
pub use engine::{Args, Engine, EngineFactory, EngineImage};
pub use errors::{ArenaError, EngineFault};
pub use host::{spawn_context, ContextConfig};
pub use reference::field::{FieldElement, GOLDILOCKS_PRIME};
pub use reference::{ReferenceEngine, ReferenceImage};
