//! Random source error types.

use thiserror::Error;

/// Random byte source errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RandomError {
    /// The platform offers no secure generator.
    #[error("no secure random source available: {0}")]
    UnsupportedEnvironment(String),
}
