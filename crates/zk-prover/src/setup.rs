//! Prover bootstrap.
//!
//! ```text
//! constraint system ──→ probe slot ──→ circuit size (pow2)
//!                                          │
//!                         CRS loader ←── size + 1 points
//!                                          │
//!          WorkerPool ──→ PooledFft::init(size), PooledPippenger::init(points)
//! ```

use crate::circuit::circuit_size;
use crate::crs::CrsLoader;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use zk_crypto::{select_random_source, RandomSource};
use zk_dispatch::EngineWorker;
use zk_engine::EngineImage;
use zk_pool::{PoolConfig, PooledFft, PooledPippenger, WorkerPool};

/// Builder for a [`ProvingContext`].
pub struct ProverSetup {
    image: EngineImage,
    config: PoolConfig,
    random: Option<Arc<dyn RandomSource>>,
}

impl ProverSetup {
    pub fn new(image: EngineImage, config: PoolConfig) -> Self {
        Self {
            image,
            config,
            random: None,
        }
    }

    /// Use `source` instead of the platform generator.
    pub fn with_random_source(mut self, source: Arc<dyn RandomSource>) -> Self {
        self.random = Some(source);
        self
    }

    /// Probe, load and bring up everything a prover needs, with defaults.
    pub async fn bootstrap(
        image: EngineImage,
        crs: &mut dyn CrsLoader,
        constraint_system: &[u8],
        config: PoolConfig,
    ) -> Result<ProvingContext> {
        Self::new(image, config).run(crs, constraint_system).await
    }

    pub async fn run(
        self,
        crs: &mut dyn CrsLoader,
        constraint_system: &[u8],
    ) -> Result<ProvingContext> {
        self.config.validate().context("invalid pool configuration")?;

        let random = match self.random {
            Some(source) => source,
            None => select_random_source().context("selecting random source")?,
        };

        let size = probe_circuit_size(&self.image, &self.config, constraint_system).await?;
        let size = usize::try_from(size).context("circuit size exceeds address space")?;

        crs.load(size + 1)
            .await
            .with_context(|| format!("loading CRS for {} points", size + 1))?;

        let pool = Arc::new(
            WorkerPool::create(self.image, self.config)
                .await
                .context("creating worker pool")?,
        );

        let fft = PooledFft::new(pool.clone());
        let pippenger = PooledPippenger::new(pool.clone());
        let ready = async {
            fft.init(size).await.context("initializing pooled FFT")?;
            let points = crs.get_data().context("reading CRS points")?;
            pippenger
                .init(points)
                .await
                .context("initializing pooled Pippenger")?;
            crs.get_g2_data()
                .map(<[u8]>::to_vec)
                .context("reading CRS G2 data")
        }
        .await;

        let g2_data = match ready {
            Ok(g2_data) => g2_data,
            Err(e) => {
                pool.destroy().await;
                return Err(e);
            }
        };

        info!(
            circuit_size = size,
            slots = pool.size(),
            random_source = random.name(),
            "Proving context ready"
        );
        Ok(ProvingContext {
            pool,
            fft: Arc::new(fft),
            pippenger: Arc::new(pippenger),
            g2_data,
            circuit_size: size,
            random,
        })
    }
}

/// Size the circuit on a throwaway single-slot pool.
async fn probe_circuit_size(
    image: &EngineImage,
    config: &PoolConfig,
    constraint_system: &[u8],
) -> Result<u64> {
    let probe = WorkerPool::create(image.clone(), config.clone().with_size(1))
        .await
        .context("creating probe context")?;
    let size = async {
        let worker = probe.primary()?;
        Ok::<_, anyhow::Error>(circuit_size(&worker, constraint_system).await?)
    }
    .await
    .context("probing circuit size");
    probe.destroy().await;
    size
}

/// Everything a prover holds once setup is complete.
pub struct ProvingContext {
    pool: Arc<WorkerPool>,
    fft: Arc<PooledFft>,
    pippenger: Arc<PooledPippenger>,
    g2_data: Vec<u8>,
    circuit_size: usize,
    random: Arc<dyn RandomSource>,
}

impl ProvingContext {
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn fft(&self) -> &Arc<PooledFft> {
        &self.fft
    }

    pub fn pippenger(&self) -> &Arc<PooledPippenger> {
        &self.pippenger
    }

    /// Worker for non-partitioned engine calls (slot 0).
    pub fn primary(&self) -> Result<EngineWorker> {
        Ok(self.pool.primary()?)
    }

    pub fn g2_data(&self) -> &[u8] {
        &self.g2_data
    }

    /// Power-of-two circuit size the domain was built for.
    pub fn circuit_size(&self) -> usize {
        self.circuit_size
    }

    pub fn random_source(&self) -> &Arc<dyn RandomSource> {
        &self.random
    }

    /// Destroy the pool. Idempotent.
    pub async fn shutdown(&self) {
        self.pool.destroy().await;
        info!("Proving context shut down");
    }
}

impl std::fmt::Debug for ProvingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvingContext")
            .field("pool", &self.pool)
            .field("circuit_size", &self.circuit_size)
            .field("random_source", &self.random.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::MemoryCrs;
    use zk_crypto::SeededRandomSource;
    use zk_engine::reference::msm::naive_msm;
    use zk_engine::{FieldElement, ReferenceImage};
    use zk_pool::PoolState;

    fn constraint_system(gates: u32) -> Vec<u8> {
        let mut cs = gates.to_le_bytes().to_vec();
        cs.extend_from_slice(&[0xAB; 12]);
        cs
    }

    fn image() -> EngineImage {
        Arc::new(ReferenceImage)
    }

    #[tokio::test]
    async fn test_bootstrap_sizes_everything_from_the_circuit() {
        let mut crs = MemoryCrs::random(64, &SeededRandomSource::new(3)).unwrap();
        let ctx = ProverSetup::new(image(), PoolConfig::default().with_size(4))
            .with_random_source(Arc::new(SeededRandomSource::new(4)))
            .run(&mut crs, &constraint_system(13))
            .await
            .unwrap();

        assert_eq!(ctx.circuit_size(), 16);
        assert_eq!(ctx.fft().domain_size(), Some(16));
        assert_eq!(ctx.pippenger().num_points(), Some(17));
        assert_eq!(ctx.pool().size(), 4);
        assert_eq!(ctx.g2_data(), crs.get_g2_data().unwrap());
        assert_eq!(ctx.random_source().name(), "seeded");

        // The loaded table is the CRS prefix.
        let points: Vec<FieldElement> = crs
            .get_data()
            .unwrap()
            .chunks_exact(8)
            .map(|c| FieldElement::from_le_bytes(c).unwrap())
            .collect();
        let scalars: Vec<FieldElement> = (1..=17).map(FieldElement::new).collect();
        let packed: Vec<u8> = scalars.iter().flat_map(|s| s.to_le_bytes()).collect();
        let result = ctx.pippenger().msm(&packed).await.unwrap();
        assert_eq!(
            FieldElement::from_le_bytes(&result),
            Some(naive_msm(&points, &scalars))
        );

        let primary = ctx.primary().unwrap();
        assert_eq!(primary.proxy().label(), "slot-0");

        ctx.shutdown().await;
        ctx.shutdown().await;
        assert_eq!(ctx.pool().state(), PoolState::Destroyed);
    }

    #[tokio::test]
    async fn test_short_crs_fails_before_pool_creation() {
        let mut crs = MemoryCrs::random(8, &SeededRandomSource::new(3)).unwrap();
        let err = ProverSetup::bootstrap(
            image(),
            &mut crs,
            &constraint_system(9),
            PoolConfig::default().with_size(2),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("loading CRS for 17 points"));
    }

    #[tokio::test]
    async fn test_truncated_constraint_system() {
        let mut crs = MemoryCrs::random(8, &SeededRandomSource::new(3)).unwrap();
        let err = ProverSetup::bootstrap(
            image(),
            &mut crs,
            &[1, 2],
            PoolConfig::default().with_size(2),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("probing circuit size"));
    }
}
