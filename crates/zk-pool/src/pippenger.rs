//! Pooled Pippenger multi-scalar multiplication.
//!
//! `init` loads the same point table into every slot's arena. Each call then
//! splits the scalar batch, computes one partial MSM per slot and adds the
//! partial points together.

use crate::errors::PoolError;
use crate::pool::WorkerPool;
use crate::runner::{PooledTaskRunner, SubTask};
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;
use zk_dispatch::DispatchError;
use zk_engine::reference::field::ELEMENT_BYTES;
use zk_engine::FieldElement;

const OP: &str = "pippenger_unsafe";

#[derive(Debug, Clone)]
struct LoadedTable {
    /// Point-table handle per slot, indexed by slot.
    handles: Vec<u64>,
    num_points: usize,
}

/// Multi-scalar multiplication partitioned across a pool.
#[derive(Debug)]
pub struct PooledPippenger {
    runner: PooledTaskRunner,
    table: RwLock<Option<LoadedTable>>,
}

impl PooledPippenger {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            runner: PooledTaskRunner::new(pool),
            table: RwLock::new(None),
        }
    }

    /// Load `points` (packed 8-byte elements) into every slot.
    pub async fn init(&self, points: &[u8]) -> Result<(), PoolError> {
        if points.len() % ELEMENT_BYTES != 0 {
            return Err(PoolError::InvalidInput(format!(
                "point buffer of {} bytes is not a whole number of points",
                points.len()
            )));
        }
        let num_points = points.len() / ELEMENT_BYTES;
        let workers = self.runner.pool().workers()?;

        // The engine copies the table, so the staging buffer is released
        // whether or not the table was built.
        let handles = try_join_all(workers.iter().map(|worker| async move {
            let addr = worker.transfer_to_heap(points).await?;
            let handle = worker.new_pippenger(addr, num_points as u64).await;
            let freed = worker.bbfree(addr).await;
            let handle = handle?;
            freed?;
            Ok::<_, DispatchError>(handle)
        }))
        .await?;

        info!(points = num_points, slots = handles.len(), "Pooled Pippenger initialized");
        *self.table.write() = Some(LoadedTable {
            handles,
            num_points,
        });
        Ok(())
    }

    /// Number of points loaded by `init`.
    pub fn num_points(&self) -> Option<usize> {
        self.table.read().as_ref().map(|t| t.num_points)
    }

    /// MSM of `scalars` (packed, `range` of them) against points
    /// `from..from + range`.
    ///
    /// Returns the resulting point as 8 bytes. An empty range yields the
    /// identity.
    pub async fn pippenger_unsafe(
        &self,
        scalars: &[u8],
        from: usize,
        range: usize,
    ) -> Result<Vec<u8>, PoolError> {
        let table = self
            .table
            .read()
            .clone()
            .ok_or(PoolError::NotInitialized("PooledPippenger"))?;

        let expected = range.checked_mul(ELEMENT_BYTES).ok_or_else(|| {
            PoolError::InvalidInput(format!("range of {} scalars is too large", range))
        })?;
        if scalars.len() != expected {
            return Err(PoolError::InvalidInput(format!(
                "expected {} scalar bytes, got {}",
                expected,
                scalars.len()
            )));
        }
        match from.checked_add(range) {
            Some(end) if end <= table.num_points => {}
            _ => {
                return Err(PoolError::InvalidInput(format!(
                    "{} points from {} exceed table of {}",
                    range, from, table.num_points
                )))
            }
        }

        let handles = &table.handles;
        let partials = self
            .runner
            .run(OP, range, |task| async move {
                let SubTask { slot, worker, range: sub } = task;
                let slice = &scalars[sub.start * ELEMENT_BYTES..sub.end * ELEMENT_BYTES];
                let addr = worker.transfer_to_heap(slice).await?;
                let point = worker
                    .pippenger_unsafe(handles[slot], addr, (from + sub.start) as u64, sub.len() as u64)
                    .await;
                let freed = worker.bbfree(addr).await;
                let point = point?;
                freed?;
                Ok::<_, DispatchError>(point)
            })
            .await?;

        let mut sum = FieldElement::ZERO;
        for partial in partials {
            let point = FieldElement::from_le_bytes(&partial.value).ok_or_else(|| {
                PoolError::MalformedResult {
                    op: OP.to_string(),
                    range: partial.range.clone(),
                    reason: format!("{} bytes is not a point", partial.value.len()),
                }
            })?;
            sum = sum + point;
        }
        Ok(sum.to_le_bytes().to_vec())
    }

    /// MSM over the whole table.
    pub async fn msm(&self, scalars: &[u8]) -> Result<Vec<u8>, PoolError> {
        let n = self
            .num_points()
            .ok_or(PoolError::NotInitialized("PooledPippenger"))?;
        self.pippenger_unsafe(scalars, 0, n).await
    }
}
