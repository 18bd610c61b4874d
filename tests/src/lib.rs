//! # Pooled Prover Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Flows that cross transport, dispatch, pool and setup
//! └── benches/           # Criterion benchmarks of the pooled operations
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p zk-tests
//!
//! # Benchmarks
//! cargo bench -p zk-tests
//! ```

#![allow(dead_code)]

pub mod integration;
