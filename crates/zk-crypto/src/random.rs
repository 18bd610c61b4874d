//! Random byte sources.
//!
//! Code that needs randomness takes a [`RandomSource`]; the concrete source is
//! chosen once at startup by [`select_random_source`].

use crate::errors::RandomError;
use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info};

/// Largest request handed to the OS generator in one call.
pub const MAX_CHUNK_BYTES: usize = 65_536;

/// A source of random bytes.
pub trait RandomSource: Send + Sync {
    /// Source name (for logs).
    fn name(&self) -> &'static str;

    /// Fill `buf` completely.
    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError>;

    /// Return `len` fresh random bytes.
    fn random_bytes(&self, len: usize) -> Result<Vec<u8>, RandomError> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }
}

/// The operating system's secure generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn name(&self) -> &'static str {
        "os"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        for chunk in buf.chunks_mut(MAX_CHUNK_BYTES) {
            OsRng
                .try_fill_bytes(chunk)
                .map_err(|e| RandomError::UnsupportedEnvironment(e.to_string()))?;
        }
        Ok(())
    }
}

/// Deterministic generator for reproducible runs. Not secure.
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandomSource {
    fn name(&self) -> &'static str {
        "seeded"
    }

    fn fill(&self, buf: &mut [u8]) -> Result<(), RandomError> {
        self.rng.lock().fill_bytes(buf);
        Ok(())
    }
}

/// Pick the platform's secure source, probing it once.
///
/// Fails with `UnsupportedEnvironment` if no secure generator answers.
pub fn select_random_source() -> Result<Arc<dyn RandomSource>, RandomError> {
    let source = OsRandomSource;
    let mut probe = [0u8; 1];
    source.fill(&mut probe)?;
    info!(source = source.name(), "Random source selected");
    Ok(Arc::new(source))
}

/// Convenience: `len` bytes from the OS generator.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, RandomError> {
    debug!(len = len, "Drawing random bytes");
    OsRandomSource.random_bytes(len)
}
