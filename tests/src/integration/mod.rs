//! # Integration Flows
//!
//! Each flow drives real execution contexts running the reference engine.

pub mod flows;
