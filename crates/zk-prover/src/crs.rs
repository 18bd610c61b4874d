//! Common reference string loading.
//!
//! The prover only needs two opaque buffers from a CRS: the G1 point table
//! (handed to the pooled MSM) and the G2 data. How they are fetched is up to
//! the [`CrsLoader`] implementation.

use crate::errors::CrsError;
use async_trait::async_trait;
use tracing::info;
use zk_crypto::RandomSource;
use zk_engine::reference::field::ELEMENT_BYTES;
use zk_engine::FieldElement;

/// Size of the G2 blob produced by [`MemoryCrs::random`].
pub const G2_DATA_BYTES: usize = 128;

/// Source of CRS data.
#[async_trait]
pub trait CrsLoader: Send + Sync {
    /// Make the first `num_points` points available.
    async fn load(&mut self, num_points: usize) -> Result<(), CrsError>;

    /// Packed point table of the loaded points.
    fn get_data(&self) -> Result<&[u8], CrsError>;

    fn get_g2_data(&self) -> Result<&[u8], CrsError>;
}

/// CRS held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryCrs {
    points: Vec<u8>,
    g2_data: Vec<u8>,
    loaded: Option<usize>,
}

impl MemoryCrs {
    /// Wrap an existing point table. `points` holds packed 8-byte elements.
    pub fn new(points: Vec<u8>, g2_data: Vec<u8>) -> Self {
        Self {
            points,
            g2_data,
            loaded: None,
        }
    }

    /// A CRS of `max_points` random points. Test setups only.
    pub fn random(max_points: usize, source: &dyn RandomSource) -> Result<Self, CrsError> {
        let raw = source.random_bytes(max_points * ELEMENT_BYTES)?;
        let points = raw
            .chunks_exact(ELEMENT_BYTES)
            .flat_map(|chunk| {
                let mut word = [0u8; ELEMENT_BYTES];
                word.copy_from_slice(chunk);
                FieldElement::new(u64::from_le_bytes(word)).to_le_bytes()
            })
            .collect();
        let g2_data = source.random_bytes(G2_DATA_BYTES)?;
        Ok(Self::new(points, g2_data))
    }

    /// Points available before loading.
    pub fn capacity(&self) -> usize {
        self.points.len() / ELEMENT_BYTES
    }
}

#[async_trait]
impl CrsLoader for MemoryCrs {
    async fn load(&mut self, num_points: usize) -> Result<(), CrsError> {
        let available = self.capacity();
        if num_points > available {
            return Err(CrsError::InsufficientPoints {
                requested: num_points,
                available,
            });
        }
        info!(points = num_points, "CRS loaded");
        self.loaded = Some(num_points);
        Ok(())
    }

    fn get_data(&self) -> Result<&[u8], CrsError> {
        let n = self.loaded.ok_or(CrsError::NotLoaded)?;
        Ok(&self.points[..n * ELEMENT_BYTES])
    }

    fn get_g2_data(&self) -> Result<&[u8], CrsError> {
        self.loaded.ok_or(CrsError::NotLoaded)?;
        Ok(&self.g2_data)
    }
}
