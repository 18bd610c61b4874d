//! # ZK Dispatch - Call-by-Name Proxies
//!
//! Turns a transport client into an engine API.
//!
//! ## Layers
//!
//! - [`DispatchProxy`]: validates every call against the engine's
//!   [`CapabilityDescriptor`](zk_types::CapabilityDescriptor), moves bulk
//!   payloads into the remote arena, and tears the context down on `destroy`
//! - [`EngineWorker`]: typed wrapper generated from the same operation table
//!   that defines [`ENGINE_CAPABILITIES`]
//!
//! ## Local vs Remote Failures
//!
//! | Error | Raised | Remote traffic |
//! |-------|--------|----------------|
//! | `UnknownOperation` | proxy | none |
//! | `ArityMismatch` | proxy | none |
//! | `UnexpectedResult` | typed wrapper | call completed |
//! | `Transport(..)` | client / engine | yes |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod interface;
pub mod proxy;

pub use errors::DispatchError;
pub use interface::{EngineWorker, FromValue, ENGINE_CAPABILITIES};
pub use proxy::DispatchProxy;

#[doc(hidden)]
pub mod __private {
    pub use zk_transport::TransportClient;
    pub use zk_types::{CapabilityDescriptor, OpSpec, Value};
}
