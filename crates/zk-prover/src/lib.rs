//! # ZK Prover - Setup Glue
//!
//! Sizes the circuit, loads the CRS and brings up the worker pool with its
//! pooled FFT and MSM, ready for a prover to use.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod circuit;
pub mod crs;
pub mod errors;
pub mod setup;

pub use circuit::{circuit_size, pow2ceil};
pub use crs::{CrsLoader, MemoryCrs};
pub use errors::CrsError;
pub use setup::{ProverSetup, ProvingContext};
