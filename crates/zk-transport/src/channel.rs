//! # Transport Channel
//!
//! A duplex, message-oriented endpoint to one execution context. The channel
//! knows nothing about requests or correlation; it moves opaque frames.
//!
//! ## In-Process Implementation
//!
//! ```text
//!  host (tokio)                                  execution context (OS thread)
//! ┌──────────────┐  std::sync::mpsc (frames)   ┌────────────────┐
//! │ WorkerChannel│ ──────────────────────────→ │ RemoteEndpoint │
//! │              │ ←────────────────────────── │                │
//! └──────────────┘  tokio::sync::mpsc (frames) └────────────────┘
//!        │
//!        └─ pump task: drains inbound frames, calls the handler in order
//! ```
//!
//! Frame order within one channel is preserved in both directions.

use crate::errors::TransportError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Something observed on the inbound side of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An inbound frame, delivered in send order.
    Frame(Vec<u8>),
    /// The remote side hung up; no further frames will arrive.
    Disconnected,
}

/// Callback invoked for every inbound event.
pub type FrameHandler = Box<dyn FnMut(ChannelEvent) + Send + 'static>;

/// Duplex message channel to one execution context.
pub trait TransportChannel: Send + Sync {
    /// Enqueue a frame for delivery to the remote side.
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Register the inbound handler. Only one handler may be registered.
    ///
    /// Must be called from within a tokio runtime.
    fn on_message(&self, handler: FrameHandler) -> Result<(), TransportError>;

    /// Release underlying resources. Idempotent.
    fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

/// Host half of an in-process channel to a worker thread.
pub struct WorkerChannel {
    label: String,
    outbound: Mutex<Option<std_mpsc::Sender<Vec<u8>>>>,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

/// Remote half of an in-process channel, owned by the execution context.
pub struct RemoteEndpoint {
    inbound: std_mpsc::Receiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// Create a connected host/remote pair.
pub fn channel_pair(label: impl Into<String>) -> (WorkerChannel, RemoteEndpoint) {
    let (to_remote, from_host) = std_mpsc::channel();
    let (to_host, from_remote) = mpsc::unbounded_channel();

    let host = WorkerChannel {
        label: label.into(),
        outbound: Mutex::new(Some(to_remote)),
        inbound: Mutex::new(Some(from_remote)),
        pump: Mutex::new(None),
        closed: AtomicBool::new(false),
    };
    let remote = RemoteEndpoint {
        inbound: from_host,
        outbound: to_host,
    };
    (host, remote)
}

impl WorkerChannel {
    /// Channel label (used in logs).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl TransportChannel for WorkerChannel {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let guard = self.outbound.lock();
        let sender = guard.as_ref().ok_or(TransportError::Closed)?;
        // A send error means the remote thread has already exited.
        sender.send(frame).map_err(|_| TransportError::Closed)
    }

    fn on_message(&self, mut handler: FrameHandler) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut receiver = self.inbound.lock().take().ok_or_else(|| {
            TransportError::Unavailable(format!("{}: handler already registered", self.label))
        })?;

        let label = self.label.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = receiver.recv().await {
                handler(ChannelEvent::Frame(frame));
            }
            debug!(channel = %label, "Remote endpoint disconnected");
            handler(ChannelEvent::Disconnected);
        });
        *self.pump.lock() = Some(pump);
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping the sender ends the remote receive loop.
        self.outbound.lock().take();
        self.inbound.lock().take();
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        debug!(channel = %self.label, "Channel closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl RemoteEndpoint {
    /// Block until the next host frame arrives. `None` once the host hung up.
    pub fn recv(&self) -> Option<Vec<u8>> {
        self.inbound.recv().ok()
    }

    /// Send a frame to the host. Returns `false` if the host has gone away.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        self.outbound.send(frame).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (host, remote) = channel_pair("test");
        let (seen_tx, mut seen_rx) = unbounded_channel();
        host.on_message(Box::new(move |event| {
            let _ = seen_tx.send(event);
        }))
        .unwrap();

        let echo = std::thread::spawn(move || {
            while let Some(frame) = remote.recv() {
                remote.send(frame);
            }
        });

        for i in 0u8..50 {
            host.send(vec![i]).unwrap();
        }
        for i in 0u8..50 {
            let event = timeout(Duration::from_secs(1), seen_rx.recv())
                .await
                .expect("timeout")
                .expect("event");
            assert_eq!(event, ChannelEvent::Frame(vec![i]));
        }

        host.close();
        echo.join().unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_is_reported() {
        let (host, remote) = channel_pair("test");
        let (seen_tx, mut seen_rx) = unbounded_channel();
        host.on_message(Box::new(move |event| {
            let _ = seen_tx.send(event);
        }))
        .unwrap();

        drop(remote);
        let event = timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("timeout")
            .expect("event");
        assert_eq!(event, ChannelEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_send() {
        let (host, _remote) = channel_pair("test");
        host.close();
        host.close();
        assert!(host.is_closed());
        assert_eq!(host.send(vec![1]), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn test_single_handler_only() {
        let (host, _remote) = channel_pair("test");
        let host = Arc::new(host);
        host.on_message(Box::new(|_| {})).unwrap();
        assert!(matches!(
            host.on_message(Box::new(|_| {})),
            Err(TransportError::Unavailable(_))
        ));
    }

    #[test]
    fn test_send_after_remote_exit_fails() {
        let (host, remote) = channel_pair("test");
        drop(remote);
        assert_eq!(host.send(vec![0]), Err(TransportError::Closed));
    }
}
