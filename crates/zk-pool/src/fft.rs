//! Pooled FFT.
//!
//! `init(domain_size)` creates the evaluation domain in every slot. A call
//! runs in two rounds over a stride `k`, the largest power of two no larger
//! than the pool or the domain:
//!
//! 1. Slot `r` receives coefficients `r, r + k, r + 2k, ...` and returns their
//!    transform over the subgroup of order `n / k`.
//! 2. Every slot receives all `k` partial transforms and returns the
//!    evaluations of its sub-range, which are scattered back at their offset.
//!
//! ```text
//! domain 16, pool 4:   slot0 → [0..4)  slot1 → [4..8)  slot2 → [8..12)  slot3 → [12..16)
//! ```

use crate::errors::PoolError;
use crate::pool::WorkerPool;
use crate::runner::{PooledTaskRunner, SubTask};
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;
use zk_dispatch::DispatchError;
use zk_engine::reference::field::ELEMENT_BYTES;

const PARTIAL_OP: &str = "fft_partial";
const MERGE_OP: &str = "fft_merge_range";

#[derive(Debug, Clone)]
struct LoadedDomain {
    /// Domain handle per slot, indexed by slot.
    handles: Vec<u64>,
    size: usize,
}

/// Domain-indexed FFT partitioned across a pool.
#[derive(Debug)]
pub struct PooledFft {
    runner: PooledTaskRunner,
    domain: RwLock<Option<LoadedDomain>>,
}

impl PooledFft {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            runner: PooledTaskRunner::new(pool),
            domain: RwLock::new(None),
        }
    }

    /// Create the evaluation domain of `domain_size` in every slot.
    pub async fn init(&self, domain_size: usize) -> Result<(), PoolError> {
        let workers = self.runner.pool().workers()?;
        let handles = try_join_all(
            workers
                .iter()
                .map(|worker| worker.new_evaluation_domain(domain_size as u64)),
        )
        .await?;

        info!(domain_size = domain_size, slots = handles.len(), "Pooled FFT initialized");
        *self.domain.write() = Some(LoadedDomain {
            handles,
            size: domain_size,
        });
        Ok(())
    }

    /// Domain size set by `init`.
    pub fn domain_size(&self) -> Option<usize> {
        self.domain.read().as_ref().map(|d| d.size)
    }

    /// Evaluate the polynomial with packed `coeffs` over the whole domain.
    ///
    /// Fewer coefficients than the domain size are zero-padded.
    pub async fn fft(&self, coeffs: &[u8]) -> Result<Vec<u8>, PoolError> {
        let domain = self
            .domain
            .read()
            .clone()
            .ok_or(PoolError::NotInitialized("PooledFft"))?;

        let capacity = domain.size * ELEMENT_BYTES;
        if coeffs.len() % ELEMENT_BYTES != 0 || coeffs.len() > capacity {
            return Err(PoolError::InvalidInput(format!(
                "{} coefficient bytes do not fit a domain of {}",
                coeffs.len(),
                domain.size
            )));
        }
        let mut padded = coeffs.to_vec();
        padded.resize(capacity, 0);

        let stride = stride_for(self.runner.pool().size(), domain.size);
        let handles = &domain.handles;
        let padded = &padded;

        let blocks = self
            .runner
            .run(PARTIAL_OP, stride, |task| async move {
                let SubTask { slot, worker, range } = task;
                let mut block = Vec::new();
                for residue in range {
                    let column: Vec<u8> = padded
                        .chunks_exact(ELEMENT_BYTES)
                        .skip(residue)
                        .step_by(stride)
                        .flatten()
                        .copied()
                        .collect();
                    let addr = worker.transfer_to_heap(&column).await?;
                    let values = worker.fft_partial(handles[slot], addr, stride as u64).await;
                    let freed = worker.bbfree(addr).await;
                    block.extend(values?);
                    freed?;
                }
                Ok::<_, DispatchError>(block)
            })
            .await?;
        let partials: Vec<u8> = blocks.into_iter().flat_map(|b| b.value).collect();
        if partials.len() != capacity {
            return Err(PoolError::MalformedResult {
                op: PARTIAL_OP.to_string(),
                range: 0..stride,
                reason: format!("expected {} bytes, got {}", capacity, partials.len()),
            });
        }

        let partials = &partials;
        let slices = self
            .runner
            .run(MERGE_OP, domain.size, |task| async move {
                let SubTask { slot, worker, range } = task;
                let addr = worker.transfer_to_heap(partials).await?;
                let values = worker
                    .fft_merge_range(
                        handles[slot],
                        addr,
                        stride as u64,
                        range.start as u64,
                        range.len() as u64,
                    )
                    .await;
                let freed = worker.bbfree(addr).await;
                let values = values?;
                freed?;
                Ok::<_, DispatchError>(values)
            })
            .await?;

        let mut output = vec![0u8; capacity];
        for slice in slices {
            let start = slice.range.start * ELEMENT_BYTES;
            let end = slice.range.end * ELEMENT_BYTES;
            if slice.value.len() != end - start {
                return Err(PoolError::MalformedResult {
                    op: MERGE_OP.to_string(),
                    range: slice.range,
                    reason: format!(
                        "expected {} bytes, got {}",
                        end - start,
                        slice.value.len()
                    ),
                });
            }
            output[start..end].copy_from_slice(&slice.value);
        }
        Ok(output)
    }
}

/// Largest power of two no larger than `slots` or `domain_size`.
fn stride_for(slots: usize, domain_size: usize) -> usize {
    let bound = slots.min(domain_size).max(1);
    1 << (usize::BITS - 1 - bound.leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use zk_engine::reference::fft::EvaluationDomain;
    use zk_engine::{EngineImage, FieldElement, ReferenceImage};

    fn coeffs(n: u64) -> Vec<FieldElement> {
        (0..n).map(|i| FieldElement::new(i * i + 3)).collect()
    }

    fn pack(values: &[FieldElement]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    async fn pool(size: usize) -> Arc<WorkerPool> {
        let image: EngineImage = Arc::new(ReferenceImage);
        Arc::new(
            WorkerPool::create(image, PoolConfig::default().with_size(size))
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_fft_before_init() {
        let pool = pool(2).await;
        let fft = PooledFft::new(pool.clone());
        assert_eq!(
            fft.fft(&[]).await.unwrap_err(),
            PoolError::NotInitialized("PooledFft")
        );
        pool.destroy().await;
    }

    #[tokio::test]
    async fn test_pooled_fft_matches_single_context() {
        for (slots, size) in [(4usize, 16u64), (3, 16), (4, 2), (1, 8)] {
            let pool = pool(slots).await;
            let fft = PooledFft::new(pool.clone());
            fft.init(size as usize).await.unwrap();

            let c = coeffs(size);
            let pooled = fft.fft(&pack(&c)).await.unwrap();
            let expected = EvaluationDomain::new(size).unwrap().fft(&c).unwrap();
            assert_eq!(pooled, pack(&expected), "slots {} size {}", slots, size);
            pool.destroy().await;
        }
    }

    #[test]
    fn test_stride_for() {
        assert_eq!(stride_for(4, 16), 4);
        assert_eq!(stride_for(3, 16), 2);
        assert_eq!(stride_for(7, 2), 2);
        assert_eq!(stride_for(1, 1), 1);
        assert_eq!(stride_for(16, 1 << 14), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_large_domain_matches_single_context() {
        let size = 1u64 << 14;
        let pool = pool(4).await;
        let fft = PooledFft::new(pool.clone());
        fft.init(size as usize).await.unwrap();

        let c = coeffs(size);
        let pooled = fft.fft(&pack(&c)).await.unwrap();
        let expected = EvaluationDomain::new(size).unwrap().fft(&c).unwrap();
        assert_eq!(pooled, pack(&expected));
        pool.destroy().await;
    }

    #[tokio::test]
    async fn test_short_input_is_padded() {
        let pool = pool(2).await;
        let fft = PooledFft::new(pool.clone());
        fft.init(8).await.unwrap();

        let c = coeffs(3);
        let pooled = fft.fft(&pack(&c)).await.unwrap();
        let expected = EvaluationDomain::new(8).unwrap().fft(&c).unwrap();
        assert_eq!(pooled, pack(&expected));

        assert!(matches!(
            fft.fft(&pack(&coeffs(9))).await,
            Err(PoolError::InvalidInput(_))
        ));
        pool.destroy().await;
    }

    #[tokio::test]
    async fn test_invalid_domain_fails_init() {
        let pool = pool(2).await;
        let fft = PooledFft::new(pool.clone());
        let err = fft.init(10).await.unwrap_err();
        assert!(matches!(err, PoolError::Dispatch(ref e) if e.is_remote()));
        assert!(fft.domain_size().is_none());
        pool.destroy().await;
    }
}
