//! # Worker Pool
//!
//! Owns a fixed-size, ordered set of execution contexts, each reachable
//! through its own [`EngineWorker`].
//!
//! ## Lifecycle
//!
//! ```text
//! [Uninitialized] ──init()──→ [Initializing] ──all slots ready──→ [Ready]
//!                                   │                                │
//!                      slot failed / destroy()                   destroy()
//!                                   ↓                                ↓
//!                              [Destroyed] ←─────────────────────────┘
//! ```
//!
//! No partially-ready pool is ever exposed: if any slot fails to come up,
//! every slot already created is destroyed and `init` fails naming the slot.
//! `destroy()` during initialization interrupts the slot being started and
//! returns only once that rollback has finished.
//!
//! ## Slot Policy
//!
//! - At least one slot; `init` with zero slots fails with `PoolInit`
//! - Slot 0 is the primary, used for one-time setup calls
//! - Slot 0 is also a regular partition target for pooled operations

use crate::config::PoolConfig;
use crate::errors::PoolError;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use zk_dispatch::EngineWorker;
use zk_engine::{spawn_context, EngineImage};
use zk_telemetry::POOL_SLOTS_LIVE;
use zk_transport::{TransportClient, TransportConfig};

/// Pool lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Uninitialized,
    Initializing,
    Ready,
    Destroyed,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolState::Uninitialized => write!(f, "uninitialized"),
            PoolState::Initializing => write!(f, "initializing"),
            PoolState::Ready => write!(f, "ready"),
            PoolState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// One execution context in the pool.
#[derive(Debug)]
pub struct PoolSlot {
    index: usize,
    worker: EngineWorker,
    busy: AtomicBool,
}

impl PoolSlot {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn worker(&self) -> &EngineWorker {
        &self.worker
    }

    /// Whether a pooled sub-task is currently running on this slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark the slot busy until the guard drops.
    pub(crate) fn claim(&self) -> BusyGuard<'_> {
        self.busy.store(true, Ordering::Release);
        BusyGuard { slot: self }
    }
}

pub(crate) struct BusyGuard<'a> {
    slot: &'a PoolSlot,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// A fixed-size pool of execution contexts.
pub struct WorkerPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
    /// Slots created so far; exposed only once `Ready`.
    slots: Mutex<Vec<Arc<PoolSlot>>>,
    /// Raised by `destroy` while initializing.
    abort: Notify,
    /// Raised by `init` once an aborted or failed startup is torn down.
    rolled_back: Notify,
}

impl WorkerPool {
    /// Create an uninitialized pool.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PoolState::Uninitialized),
            slots: Mutex::new(Vec::new()),
            abort: Notify::new(),
            rolled_back: Notify::new(),
        }
    }

    /// Create and initialize a pool sized by `config`.
    pub async fn create(image: EngineImage, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let size = config.resolved_size();
        let pool = Self::new(config);
        pool.init(image, size).await?;
        Ok(pool)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    /// Bring up `size` execution contexts.
    ///
    /// At most `spawn_concurrency` contexts initialize at once. The pool is
    /// `Ready` only when every slot has reported ready.
    pub async fn init(&self, image: EngineImage, size: usize) -> Result<(), PoolError> {
        {
            let mut state = self.state.lock();
            if *state != PoolState::Uninitialized {
                return Err(PoolError::InvalidState {
                    expected: PoolState::Uninitialized,
                    actual: *state,
                });
            }
            if size == 0 {
                *state = PoolState::Destroyed;
                return Err(PoolError::PoolInit {
                    slot: 0,
                    reason: "a pool must contain at least one slot".into(),
                });
            }
            *state = PoolState::Initializing;
        }

        info!(
            image = image.name(),
            size = size,
            concurrency = self.config.spawn_concurrency,
            "Initializing worker pool"
        );

        let failure = {
            let mut spawning = stream::iter(0..size)
                .map(|slot| self.spawn_slot(image.clone(), slot))
                .buffered(self.config.spawn_concurrency.max(1));

            loop {
                let starting = self.slots.lock().len();
                tokio::select! {
                    biased;
                    _ = self.abort.notified() => {
                        break Some(PoolError::PoolInit {
                            slot: starting,
                            reason: "pool destroyed during initialization".into(),
                        });
                    }
                    next = spawning.next() => match next {
                        Some(Ok(slot)) => {
                            POOL_SLOTS_LIVE.inc();
                            self.slots.lock().push(Arc::new(slot));
                        }
                        Some(Err(e)) => break Some(e),
                        None => break None,
                    },
                }
            }
            // Dropping the stream closes any context still starting up.
        };

        let failure = match failure {
            Some(failure) => failure,
            None => {
                let mut state = self.state.lock();
                if *state == PoolState::Initializing {
                    *state = PoolState::Ready;
                    info!(size = size, "Worker pool ready");
                    return Ok(());
                }
                // destroy() landed after the last slot came up.
                PoolError::PoolInit {
                    slot: size - 1,
                    reason: "pool destroyed during initialization".into(),
                }
            }
        };

        *self.state.lock() = PoolState::Destroyed;
        let created = std::mem::take(&mut *self.slots.lock());
        warn!(created = created.len(), error = %failure, "Worker pool initialization failed, rolling back");
        for slot in &created {
            slot.worker.destroy().await;
            POOL_SLOTS_LIVE.dec();
        }
        self.rolled_back.notify_one();
        Err(failure)
    }

    async fn spawn_slot(&self, image: EngineImage, index: usize) -> Result<PoolSlot, PoolError> {
        let init_error = |e: &dyn fmt::Display| PoolError::PoolInit {
            slot: index,
            reason: e.to_string(),
        };

        let channel =
            spawn_context(image, index, &self.config.context_config()).map_err(|e| init_error(&e))?;
        let transport = TransportConfig {
            request_timeout: self.config.request_timeout,
        };
        let client = TransportClient::with_config(format!("slot-{}", index), Arc::new(channel), transport);
        let engine = client.open().await.map_err(|e| init_error(&e))?;
        debug!(slot = index, engine = %engine, "Slot ready");

        Ok(PoolSlot {
            index,
            worker: EngineWorker::new(Arc::new(client)),
            busy: AtomicBool::new(false),
        })
    }

    /// Ordered slots; index 0 is the primary.
    pub fn slots(&self) -> Result<Vec<Arc<PoolSlot>>, PoolError> {
        self.ensure_ready()?;
        Ok(self.slots.lock().clone())
    }

    /// Ordered workers; index 0 is the primary.
    pub fn workers(&self) -> Result<Vec<EngineWorker>, PoolError> {
        Ok(self.slots()?.iter().map(|s| s.worker.clone()).collect())
    }

    /// The primary worker (slot 0).
    pub fn primary(&self) -> Result<EngineWorker, PoolError> {
        self.ensure_ready()?;
        self.slots
            .lock()
            .first()
            .map(|s| s.worker.clone())
            .ok_or(PoolError::InvalidState {
                expected: PoolState::Ready,
                actual: PoolState::Uninitialized,
            })
    }

    /// Number of live slots, including those up during initialization.
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.lock().len()
    }

    fn ensure_ready(&self) -> Result<(), PoolError> {
        match self.state() {
            PoolState::Ready => Ok(()),
            actual => Err(PoolError::InvalidState {
                expected: PoolState::Ready,
                actual,
            }),
        }
    }

    /// Destroy every slot in slot order.
    ///
    /// Idempotent. Called during `init`, it aborts initialization and waits
    /// until `init` has destroyed every slot it created.
    pub async fn destroy(&self) {
        let slots = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = PoolState::Destroyed;
            match previous {
                PoolState::Ready => Some(std::mem::take(&mut *self.slots.lock())),
                PoolState::Initializing => {
                    info!("Worker pool destroyed during initialization");
                    self.abort.notify_one();
                    None
                }
                PoolState::Uninitialized | PoolState::Destroyed => return,
            }
        };
        let Some(slots) = slots else {
            self.rolled_back.notified().await;
            debug!("Initialization rollback finished");
            return;
        };

        for slot in &slots {
            slot.worker.destroy().await;
            POOL_SLOTS_LIVE.dec();
            debug!(slot = slot.index, "Slot destroyed");
        }
        info!(size = slots.len(), "Worker pool destroyed");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Slots still held here close their clients on drop; keep the gauge honest.
        let live = self.slots.get_mut().len();
        if live > 0 {
            POOL_SLOTS_LIVE.sub(live as f64);
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("state", &self.state())
            .field("size", &self.size())
            .finish()
    }
}
