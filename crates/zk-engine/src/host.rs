//! # Execution Context Host
//!
//! Runs one engine instance and its private arena on a dedicated OS thread,
//! serving requests from a [`RemoteEndpoint`] in arrival order.
//!
//! ## Context Protocol
//!
//! ```text
//! spawn ──→ instantiate engine ──ok──→ send Ready ──→ serve loop ──→ exit
//!                   │                                   │
//!                   └──err──→ send InitFailed ──→ exit  ├─ __destroy_worker__: ack, exit
//!                                                       └─ host hung up: exit
//! ```
//!
//! The host answers the reserved memory operations itself; everything else
//! is forwarded to the engine.

use crate::arena::{MemoryArena, DEFAULT_ARENA_CAPACITY};
use crate::engine::{Args, Engine, EngineImage};
use crate::errors::EngineFault;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};
use zk_transport::{channel_pair, RemoteEndpoint, TransportError, WorkerChannel};
use zk_types::{
    HostFrame, RemoteFault, Request, Response, Value, WorkerFrame, ALLOC_OP, DESTROY_OP, FREE_OP,
    READ_MEMORY_OP, WRITE_MEMORY_OP,
};

/// Execution context settings.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Arena capacity in bytes
    pub arena_capacity: u64,
    /// Worker thread name prefix; the slot index is appended
    pub thread_prefix: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            thread_prefix: "zk-worker".to_string(),
        }
    }
}

/// Spawn an execution context for `slot` and return the host side of its
/// channel.
///
/// Fails with [`TransportError::Unavailable`] if the thread cannot be created.
/// Engine construction happens on the new thread; its outcome is reported on
/// the channel as the first frame.
pub fn spawn_context(
    image: EngineImage,
    slot: usize,
    config: &ContextConfig,
) -> Result<WorkerChannel, TransportError> {
    let (host, remote) = channel_pair(format!("slot-{}", slot));
    let capacity = config.arena_capacity;

    std::thread::Builder::new()
        .name(format!("{}-{}", config.thread_prefix, slot))
        .spawn(move || run_context(image, slot, capacity, remote))
        .map_err(|e| TransportError::Unavailable(format!("slot {}: {}", slot, e)))?;

    debug!(slot = slot, "Execution context spawned");
    Ok(host)
}

fn send_frame(remote: &RemoteEndpoint, frame: &WorkerFrame) -> bool {
    match frame.encode() {
        Ok(bytes) => remote.send(bytes),
        Err(e) => {
            error!(error = %e, "Failed to encode worker frame");
            false
        }
    }
}

fn run_context(image: EngineImage, slot: usize, capacity: u64, remote: RemoteEndpoint) {
    let instantiated = catch_unwind(AssertUnwindSafe(|| image.instantiate(slot)))
        .unwrap_or_else(|panic| Err(EngineFault::Panicked(panic_message(&panic))));

    let mut engine = match instantiated {
        Ok(engine) => engine,
        Err(fault) => {
            warn!(slot = slot, error = %fault, "Engine instantiation failed");
            send_frame(
                &remote,
                &WorkerFrame::InitFailed {
                    reason: format!("slot {}: {}", slot, fault),
                },
            );
            return;
        }
    };

    let mut arena = MemoryArena::new(capacity);
    if !send_frame(
        &remote,
        &WorkerFrame::Ready {
            engine: engine.name().to_string(),
        },
    ) {
        return;
    }

    while let Some(bytes) = remote.recv() {
        let request = match HostFrame::decode(&bytes) {
            Ok(HostFrame::Request(request)) => request,
            Err(e) => {
                warn!(slot = slot, error = %e, "Dropping malformed host frame");
                continue;
            }
        };

        if request.op == DESTROY_OP {
            send_frame(
                &remote,
                &WorkerFrame::Response(Response {
                    id: request.id,
                    outcome: Ok(Value::Unit),
                }),
            );
            info!(slot = slot, "Execution context destroyed on request");
            return;
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| serve(engine.as_mut(), &mut arena, &request)))
            .unwrap_or_else(|panic| Err(EngineFault::Panicked(panic_message(&panic))))
            .map_err(|fault| RemoteFault::new(request.op.clone(), fault.to_string()));
        if let Err(fault) = &outcome {
            debug!(slot = slot, correlation_id = %request.id, error = %fault, "Operation failed");
        }

        let response = WorkerFrame::Response(Response {
            id: request.id,
            outcome,
        });
        if !send_frame(&remote, &response) {
            break;
        }
    }

    debug!(slot = slot, "Execution context exiting");
}

/// Execute one request against the arena or the engine.
fn serve(
    engine: &mut dyn Engine,
    arena: &mut MemoryArena,
    request: &Request,
) -> Result<Value, EngineFault> {
    let op = request.op.as_str();
    let args = &request.args;

    match op {
        ALLOC_OP => {
            let args = Args::new(op, args, 1)?;
            Ok(Value::Number(arena.alloc(args.number(0)?)?))
        }
        FREE_OP => {
            let args = Args::new(op, args, 1)?;
            arena.free(args.number(0)?)?;
            Ok(Value::Unit)
        }
        WRITE_MEMORY_OP => {
            let args = Args::new(op, args, 2)?;
            arena.write(args.number(0)?, args.bytes(1)?)?;
            Ok(Value::Unit)
        }
        READ_MEMORY_OP => {
            let args = Args::new(op, args, 2)?;
            let bytes = arena.read(args.number(0)?, args.number(1)?)?;
            Ok(Value::Bytes(bytes.to_vec()))
        }
        _ => engine.call(op, args, arena),
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
