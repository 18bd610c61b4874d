use thiserror::Error;
use zk_crypto::RandomError;

/// CRS loading errors.
#[derive(Debug, Error)]
pub enum CrsError {
    #[error("CRS holds {available} points, {requested} requested")]
    InsufficientPoints { requested: usize, available: usize },

    #[error("CRS read before load")]
    NotLoaded,

    #[error(transparent)]
    Random(#[from] RandomError),
}
