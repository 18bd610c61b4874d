//! # ZK Crypto - Random Byte Sources
//!
//! Randomness is a capability: callers hold an `Arc<dyn RandomSource>` chosen
//! once at startup instead of probing the environment at each use.
//!
//! | Source | Secure | Use |
//! |--------|--------|-----|
//! | [`OsRandomSource`] | yes | default, via the OS generator |
//! | [`SeededRandomSource`] | no | reproducible runs and tests |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod random;

pub use errors::RandomError;
pub use random::{
    random_bytes, select_random_source, OsRandomSource, RandomSource, SeededRandomSource,
    MAX_CHUNK_BYTES,
};
