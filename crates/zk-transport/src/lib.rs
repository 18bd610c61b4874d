//! # ZK Transport - Channels and Correlating Clients
//!
//! Moves frames between the orchestrating side and execution contexts, and
//! turns that frame stream into awaitable request/response calls.
//!
//! ## Layers
//!
//! - [`channel`]: duplex frame channel ([`TransportChannel`]) with an
//!   in-process implementation backed by a dedicated OS thread
//! - [`pending`]: concurrent correlation-id → waiter map
//! - [`client`]: [`TransportClient`] with `open` / `request` / `close`
//!
//! ## Correlation Guarantee
//!
//! Every response is delivered to exactly the caller that issued the request
//! with the same correlation id. Malformed or uncorrelated frames are dropped
//! and counted; they never resolve someone else's request.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod client;
pub mod errors;
pub mod pending;

pub use channel::{channel_pair, ChannelEvent, FrameHandler, RemoteEndpoint, TransportChannel, WorkerChannel};
pub use client::{TransportClient, TransportConfig};
pub use errors::TransportError;
pub use pending::{PendingRequests, PendingSnapshot};
