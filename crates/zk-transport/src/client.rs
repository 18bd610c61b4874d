//! # Transport Client
//!
//! Layered on a [`TransportChannel`]: assigns correlation ids to outbound
//! requests and routes each inbound response to exactly the caller that is
//! waiting for it.
//!
//! ## Lifecycle
//!
//! ```text
//! [Idle] ──open()──→ [Open] ──close()──→ [Closed]
//!    │                                      ↑
//!    └──────────────── close() ─────────────┘
//! ```
//!
//! Any number of `request` calls may be in flight at once; responses may
//! arrive in any order.

use crate::channel::{ChannelEvent, TransportChannel};
use crate::errors::TransportError;
use crate::pending::{PendingRequests, PendingSnapshot};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use zk_telemetry::{FRAMES_DROPPED, REQUESTS_SENT, REQUEST_FAILURES};
use zk_types::{CorrelationCounter, HostFrame, Request, Value, WorkerFrame};

/// Client policy knobs.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Optional deadline applied to every request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl TransportConfig {
    /// Builder-style method to set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Idle,
    Open,
    Closed,
}

type ReadySlot = Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>;

/// Correlating request/response client over one channel.
pub struct TransportClient {
    label: String,
    channel: Arc<dyn TransportChannel>,
    pending: Arc<PendingRequests>,
    ids: CorrelationCounter,
    state: Mutex<ClientState>,
    config: TransportConfig,
}

impl TransportClient {
    /// Create a client over a channel. Call [`open`](Self::open) before use.
    pub fn new(label: impl Into<String>, channel: Arc<dyn TransportChannel>) -> Self {
        Self::with_config(label, channel, TransportConfig::default())
    }

    /// Create a client with an explicit policy.
    pub fn with_config(
        label: impl Into<String>,
        channel: Arc<dyn TransportChannel>,
        config: TransportConfig,
    ) -> Self {
        Self {
            label: label.into(),
            channel,
            pending: Arc::new(PendingRequests::new()),
            ids: CorrelationCounter::new(),
            state: Mutex::new(ClientState::Idle),
            config,
        }
    }

    /// Client label (used in logs).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Register the inbound handler and wait until the execution context
    /// reports readiness.
    ///
    /// Returns the engine name announced by the context.
    pub async fn open(&self) -> Result<String, TransportError> {
        match *self.state.lock() {
            ClientState::Idle => {}
            ClientState::Open => {
                return Err(TransportError::Unavailable(format!(
                    "{}: already open",
                    self.label
                )))
            }
            ClientState::Closed => return Err(TransportError::Closed),
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let ready: ReadySlot = Arc::new(Mutex::new(Some(ready_tx)));
        let handler = inbound_handler(self.label.clone(), self.pending.clone(), ready);
        self.channel.on_message(Box::new(handler))?;

        let announced = match ready_rx.await {
            Ok(Ok(engine)) => engine,
            Ok(Err(reason)) => return Err(TransportError::Unavailable(reason)),
            Err(_) => {
                return Err(TransportError::Unavailable(format!(
                    "{}: channel dropped before readiness",
                    self.label
                )))
            }
        };

        {
            let mut state = self.state.lock();
            if *state == ClientState::Closed {
                return Err(TransportError::Closed);
            }
            *state = ClientState::Open;
        }
        info!(client = %self.label, engine = %announced, "Transport client open");
        Ok(announced)
    }

    /// Issue a request and wait for its matching response.
    pub async fn request(&self, op: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        let result = self.request_inner(op, args).await;
        if let Err(e) = &result {
            REQUEST_FAILURES.with_label_values(&[e.kind()]).inc();
        }
        result
    }

    async fn request_inner(&self, op: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        match *self.state.lock() {
            ClientState::Open => {}
            ClientState::Closed => return Err(TransportError::Closed),
            ClientState::Idle => {
                return Err(TransportError::Unavailable(format!(
                    "{}: client not open",
                    self.label
                )))
            }
        }

        let id = self.ids.next_id();
        let receiver = self.pending.register(id, op);

        // close() may have drained the store between the state check and
        // the registration above.
        if self.is_closed() {
            self.pending.forget(id);
            return Err(TransportError::Closed);
        }

        let frame = HostFrame::Request(Request {
            id,
            op: op.to_string(),
            args,
        });
        let send_result = frame
            .encode()
            .map_err(TransportError::from)
            .and_then(|bytes| self.channel.send(bytes));
        if let Err(e) = send_result {
            self.pending.forget(id);
            return Err(e);
        }

        REQUESTS_SENT.with_label_values(&[op]).inc();
        debug!(client = %self.label, correlation_id = %id, op = op, "Request sent");

        let outcome = match self.config.request_timeout {
            Some(after) => match tokio::time::timeout(after, receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.forget(id);
                    warn!(client = %self.label, correlation_id = %id, op = op, "Request timed out");
                    return Err(TransportError::Timeout {
                        op: op.to_string(),
                        after,
                    });
                }
            },
            None => receiver.await,
        };

        // A dropped sender means the store was torn down with the client.
        outcome.unwrap_or(Err(TransportError::Closed))
    }

    /// Reject all pending requests with `Closed` and release the channel.
    ///
    /// Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == ClientState::Closed {
                return;
            }
            *state = ClientState::Closed;
        }
        self.channel.close();
        let failed = self.pending.fail_all(&TransportError::Closed);
        info!(client = %self.label, failed_pending = failed, "Transport client closed");
    }

    /// Whether the client has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.state.lock() == ClientState::Closed
    }

    /// Number of requests currently in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    /// Request statistics.
    #[must_use]
    pub fn stats(&self) -> PendingSnapshot {
        self.pending.snapshot()
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the inbound handler: decodes frames, resolves readiness and routes
/// responses by correlation id.
fn inbound_handler(
    label: String,
    pending: Arc<PendingRequests>,
    ready: ReadySlot,
) -> impl FnMut(ChannelEvent) + Send + 'static {
    move |event| match event {
        ChannelEvent::Frame(bytes) => match WorkerFrame::decode(&bytes) {
            Ok(WorkerFrame::Response(response)) => {
                let outcome = response.outcome.map_err(TransportError::Remote);
                if !pending.complete(response.id, outcome) {
                    FRAMES_DROPPED.inc();
                }
            }
            Ok(WorkerFrame::Ready { engine }) => match ready.lock().take() {
                Some(tx) => {
                    let _ = tx.send(Ok(engine));
                }
                None => warn!(client = %label, "Duplicate readiness frame ignored"),
            },
            Ok(WorkerFrame::InitFailed { reason }) => {
                if let Some(tx) = ready.lock().take() {
                    let _ = tx.send(Err(reason));
                }
            }
            Err(e) => {
                FRAMES_DROPPED.inc();
                warn!(client = %label, error = %e, len = bytes.len(), "Dropping malformed frame");
            }
        },
        ChannelEvent::Disconnected => {
            if let Some(tx) = ready.lock().take() {
                let _ = tx.send(Err(format!("{}: execution context exited", label)));
            }
            let failed = pending.fail_all(&TransportError::Closed);
            if failed > 0 {
                warn!(client = %label, failed = failed, "Execution context hung up with requests in flight");
            }
        }
    }
}
