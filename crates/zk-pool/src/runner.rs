//! # Pooled Task Runner
//!
//! Fans one bulk operation out across the pool: the domain is partitioned,
//! sub-range `i` runs on slot `i`, and results come back keyed by sub-range
//! index. Completion order across slots is never observed.
//!
//! ## Failure Semantics
//!
//! All sub-tasks are awaited before the outcome is decided, so no slot is left
//! with work in flight. If any of them failed, the call fails with
//! `SubtaskFailed` for the lowest failing range and every sibling result is
//! dropped.

use crate::errors::PoolError;
use crate::partition::partition;
use crate::pool::WorkerPool;
use futures::future::join_all;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};
use zk_dispatch::{DispatchError, EngineWorker};
use zk_telemetry::{OpTimer, SUBTASK_FAILURES};

/// One unit of partitioned work handed to a sub-task.
#[derive(Debug, Clone)]
pub struct SubTask {
    /// Slot the sub-range is assigned to.
    pub slot: usize,
    pub worker: EngineWorker,
    pub range: Range<usize>,
}

/// One sub-range's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubResult<T> {
    /// Position of the sub-range in the partition.
    pub index: usize,
    /// Slot that computed it.
    pub slot: usize,
    pub range: Range<usize>,
    pub value: T,
}

/// Runs partitioned operations over a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PooledTaskRunner {
    pool: Arc<WorkerPool>,
}

impl PooledTaskRunner {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Partition `[0, n)` across the pool and run `task` once per sub-range.
    ///
    /// Results are returned in sub-range order.
    pub async fn run<T, F, Fut>(
        &self,
        op: &str,
        n: usize,
        task: F,
    ) -> Result<Vec<SubResult<T>>, PoolError>
    where
        F: Fn(SubTask) -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let _timer = OpTimer::start(op);
        let slots = self.pool.slots()?;
        let ranges = partition(n, slots.len());
        debug!(op = op, n = n, parts = ranges.len(), "Running partitioned operation");

        let task = &task;
        let outcomes = join_all(ranges.into_iter().zip(slots.iter()).enumerate().map(
            |(index, (range, slot))| async move {
                let _busy = slot.claim();
                let outcome = task(SubTask {
                    slot: slot.index(),
                    worker: slot.worker().clone(),
                    range: range.clone(),
                })
                .await;
                (index, slot.index(), range, outcome)
            },
        ))
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (index, slot, range, outcome) in outcomes {
            match outcome {
                Ok(value) => results.push(SubResult {
                    index,
                    slot,
                    range,
                    value,
                }),
                Err(source) => {
                    SUBTASK_FAILURES.with_label_values(&[op]).inc();
                    warn!(op = op, slot = slot, range = ?range, error = %source, "Sub-task failed");
                    return Err(PoolError::SubtaskFailed {
                        op: op.to_string(),
                        range,
                        slot,
                        source,
                    });
                }
            }
        }
        Ok(results)
    }
}
