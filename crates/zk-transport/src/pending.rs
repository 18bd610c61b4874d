//! Pending request store.
//!
//! Maps correlation ids to the waiting callers of one transport client. Each
//! entry is resolved exactly once: by its matching response, by a timeout, or
//! by the client closing.

use crate::errors::TransportError;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use zk_types::{CorrelationId, Value};

/// Outcome delivered to a waiting caller.
pub type RequestOutcome = Result<Value, TransportError>;

/// A request waiting for its response.
struct PendingRequest {
    /// Channel to deliver the outcome
    sender: oneshot::Sender<RequestOutcome>,
    /// When the request was registered
    created_at: Instant,
    /// Operation name (for logging)
    op: String,
}

/// Statistics for the pending request store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total requests registered
    pub total_registered: AtomicU64,
    /// Total requests resolved by a matching response
    pub total_completed: AtomicU64,
    /// Total requests failed locally (close, timeout, send failure)
    pub total_failed: AtomicU64,
    /// Responses that matched no pending request
    pub total_unmatched: AtomicU64,
}

/// Snapshot of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub failed: u64,
    pub unmatched: u64,
    pub pending: usize,
}

/// Concurrent map of in-flight requests.
///
/// Flow:
/// 1. Client allocates a `CorrelationId`
/// 2. Client calls `register()` to get a oneshot receiver
/// 3. Client sends the request frame
/// 4. Inbound handler receives the response and calls `complete()`
/// 5. Client awaits the receiver
#[derive(Default)]
pub struct PendingRequests {
    pending: DashMap<CorrelationId, PendingRequest>,
    stats: PendingStats,
}

impl PendingRequests {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and get the receiver for its outcome.
    pub fn register(&self, id: CorrelationId, op: &str) -> oneshot::Receiver<RequestOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingRequest {
                sender: tx,
                created_at: Instant::now(),
                op: op.to_string(),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        rx
    }

    /// Resolve a pending request with its response.
    ///
    /// Returns false if no request with this id is pending; the response is
    /// then dropped and never handed to anyone else.
    pub fn complete(&self, id: CorrelationId, outcome: RequestOutcome) -> bool {
        let Some((_, request)) = self.pending.remove(&id) else {
            self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
            warn!(correlation_id = %id, "Response for unknown or expired correlation ID");
            return false;
        };

        let elapsed = request.created_at.elapsed();
        if request.sender.send(outcome).is_err() {
            // The caller stopped waiting (future dropped).
            debug!(correlation_id = %id, op = %request.op, "Pending request receiver dropped");
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %id,
            op = %request.op,
            response_time_us = elapsed.as_micros() as u64,
            "Completed pending request"
        );
        true
    }

    /// Fail one request locally.
    pub fn fail(&self, id: CorrelationId, error: TransportError) -> bool {
        let Some((_, request)) = self.pending.remove(&id) else {
            return false;
        };
        self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        let _ = request.sender.send(Err(error));
        true
    }

    /// Remove a request without resolving it (caller already gave up).
    pub fn forget(&self, id: CorrelationId) -> bool {
        if self.pending.remove(&id).is_some() {
            self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Fail every pending request with a fresh copy of `error`.
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&self, error: &TransportError) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.fail(*id, error.clone()))
            .count()
    }

    /// Number of requests currently in flight
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check whether an id is pending
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    /// Get a stats snapshot
    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            completed: self.stats.total_completed.load(Ordering::Relaxed),
            failed: self.stats.total_failed.load(Ordering::Relaxed),
            unmatched: self.stats.total_unmatched.load(Ordering::Relaxed),
            pending: self.pending.len(),
        }
    }
}
