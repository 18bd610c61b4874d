//! # Dispatch Proxy
//!
//! Presents an execution context as a set of named operations. Every call is
//! checked against the engine's [`CapabilityDescriptor`] before it reaches the
//! transport client.
//!
//! ## Bulk Payloads
//!
//! Large inputs are never passed as call arguments. They are copied into the
//! context's arena first:
//!
//! ```text
//! transfer_to_heap(bytes) = bbmalloc(len) → addr, write_memory(addr, bytes)
//! ```
//!
//! and the returned address is passed to the engine operation instead.

use crate::errors::DispatchError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zk_transport::{TransportClient, TransportError};
use zk_types::{
    CapabilityDescriptor, Value, ALLOC_OP, DESTROY_OP, FREE_OP, READ_MEMORY_OP, WRITE_MEMORY_OP,
};

/// Call-by-name front for one execution context.
pub struct DispatchProxy {
    descriptor: CapabilityDescriptor,
    client: Arc<TransportClient>,
    destroyed: AtomicBool,
}

impl DispatchProxy {
    /// Wrap an open transport client.
    pub fn new(descriptor: CapabilityDescriptor, client: Arc<TransportClient>) -> Self {
        Self {
            descriptor,
            client,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Descriptor calls are validated against.
    #[must_use]
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    /// Label of the underlying client.
    #[must_use]
    pub fn label(&self) -> &str {
        self.client.label()
    }

    /// Invoke `op` with `args`.
    ///
    /// Fails locally with `UnknownOperation` or `ArityMismatch` without any
    /// remote traffic.
    pub async fn call(&self, op: &str, args: Vec<Value>) -> Result<Value, DispatchError> {
        let spec = self
            .descriptor
            .lookup(op)
            .ok_or_else(|| DispatchError::UnknownOperation {
                op: op.to_string(),
                engine: self.descriptor.name,
            })?;

        if spec.arity != args.len() {
            return Err(DispatchError::ArityMismatch {
                op: op.to_string(),
                expected: spec.arity,
                actual: args.len(),
            });
        }

        Ok(self.client.request(op, args).await?)
    }

    /// Copy `bytes` into the context's arena and return the address.
    pub async fn transfer_to_heap(&self, bytes: &[u8]) -> Result<u64, DispatchError> {
        let addr = self
            .call(ALLOC_OP, vec![Value::Number(bytes.len() as u64)])
            .await
            .and_then(|v| expect_number(ALLOC_OP, v))?;
        if let Err(e) = self
            .call(WRITE_MEMORY_OP, vec![Value::Number(addr), Value::from(bytes)])
            .await
        {
            if let Err(free_err) = self.free(addr).await {
                warn!(proxy = %self.label(), addr = addr, error = %free_err, "Failed to release unwritten allocation");
            }
            return Err(e);
        }
        debug!(proxy = %self.label(), addr = addr, len = bytes.len(), "Payload transferred to heap");
        Ok(addr)
    }

    /// Copy `len` bytes at `addr` out of the context's arena.
    pub async fn transfer_from_heap(&self, addr: u64, len: u64) -> Result<Vec<u8>, DispatchError> {
        let value = self
            .call(READ_MEMORY_OP, vec![Value::Number(addr), Value::Number(len)])
            .await?;
        expect_bytes(READ_MEMORY_OP, value)
    }

    /// Release an arena allocation.
    pub async fn free(&self, addr: u64) -> Result<(), DispatchError> {
        self.call(FREE_OP, vec![Value::Number(addr)]).await?;
        Ok(())
    }

    /// Tear down the execution context: send the reserved destroy operation,
    /// await its acknowledgement, then close the client.
    ///
    /// Idempotent. A context that is already gone is closed without error.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        match self.client.request(DESTROY_OP, Vec::new()).await {
            Ok(_) => {}
            Err(TransportError::Closed) => {
                debug!(proxy = %self.label(), "Context already gone at destroy");
            }
            Err(e) => {
                warn!(proxy = %self.label(), error = %e, "Destroy not acknowledged");
            }
        }
        self.client.close();
        info!(proxy = %self.label(), "Worker destroyed");
    }

    /// Whether [`destroy`](Self::destroy) has been called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of calls currently in flight on this proxy.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.client.pending_count()
    }
}

impl std::fmt::Debug for DispatchProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchProxy")
            .field("label", &self.label())
            .field("descriptor", &self.descriptor.to_string())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

pub(crate) fn expect_number(op: &str, value: Value) -> Result<u64, DispatchError> {
    value.as_number().ok_or_else(|| DispatchError::UnexpectedResult {
        op: op.to_string(),
        expected: zk_types::ValueKind::Number,
        actual: value.kind(),
    })
}

pub(crate) fn expect_bytes(op: &str, value: Value) -> Result<Vec<u8>, DispatchError> {
    let actual = value.kind();
    value.into_bytes().ok_or_else(|| DispatchError::UnexpectedResult {
        op: op.to_string(),
        expected: zk_types::ValueKind::Bytes,
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::ENGINE_CAPABILITIES;
    use std::time::Duration;
    use tokio::time::timeout;
    use zk_engine::{spawn_context, ContextConfig, EngineImage, ReferenceImage};
    use zk_types::{HostFrame, RemoteFault, Response, WorkerFrame};

    async fn spawn_proxy(slot: usize) -> DispatchProxy {
        let image: EngineImage = Arc::new(ReferenceImage);
        let channel = spawn_context(image, slot, &ContextConfig::default()).unwrap();
        let client = Arc::new(TransportClient::new(format!("slot-{}", slot), Arc::new(channel)));
        client.open().await.unwrap();
        DispatchProxy::new(ENGINE_CAPABILITIES, client)
    }

    #[tokio::test]
    async fn test_unknown_operation_is_local() {
        let proxy = spawn_proxy(0).await;
        let err = proxy.call("sha512", vec![]).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownOperation { ref op, .. } if op == "sha512"));
        assert_eq!(proxy.client.stats().registered, 0);
        proxy.destroy().await;
    }

    #[tokio::test]
    async fn test_arity_mismatch_is_local() {
        let proxy = spawn_proxy(0).await;
        let err = proxy
            .call("new_evaluation_domain", vec![Value::Number(8), Value::Number(1)])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::ArityMismatch {
                op: "new_evaluation_domain".into(),
                expected: 1,
                actual: 2,
            }
        );
        assert_eq!(proxy.client.stats().registered, 0);
        proxy.destroy().await;
    }

    #[tokio::test]
    async fn test_heap_transfer_roundtrip() {
        let proxy = spawn_proxy(1).await;
        let payload: Vec<u8> = (0..=255u8).collect();
        let addr = proxy.transfer_to_heap(&payload).await.unwrap();
        assert_ne!(addr, 0);
        let back = proxy.transfer_from_heap(addr, payload.len() as u64).await.unwrap();
        assert_eq!(back, payload);
        proxy.free(addr).await.unwrap();
        proxy.destroy().await;
    }

    #[tokio::test]
    async fn test_concurrent_transfers_get_distinct_addresses() {
        let proxy = spawn_proxy(3).await;
        let payloads: Vec<Vec<u8>> = (0..16u8).map(|i| vec![i; 24]).collect();
        let addrs = futures::future::try_join_all(payloads.iter().map(|p| proxy.transfer_to_heap(p)))
            .await
            .unwrap();

        for (addr, payload) in addrs.iter().zip(&payloads) {
            let back = proxy.transfer_from_heap(*addr, 24).await.unwrap();
            assert_eq!(&back, payload);
        }
        proxy.destroy().await;
    }

    #[tokio::test]
    async fn test_remote_fault_surfaces_as_transport_error() {
        let proxy = spawn_proxy(0).await;
        let err = proxy.free(4096).await.unwrap_err();
        assert!(err.is_remote());
        proxy.destroy().await;
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let proxy = spawn_proxy(2).await;
        proxy.destroy().await;
        timeout(Duration::from_secs(1), proxy.destroy())
            .await
            .expect("second destroy hung");
        assert!(proxy.is_destroyed());

        let err = proxy.call(ALLOC_OP, vec![Value::Number(8)]).await.unwrap_err();
        assert_eq!(err, DispatchError::Transport(TransportError::Closed));
    }

    #[test]
    fn test_expect_helpers() {
        assert_eq!(expect_number("op", Value::Number(3)), Ok(3));
        let err = expect_bytes("op", Value::Unit).unwrap_err();
        assert_eq!(err.to_string(), "operation 'op' returned unit, expected bytes");
    }

    /// Context whose arena accepts allocations but rejects every write.
    fn spawn_write_failing_context() -> (Arc<TransportClient>, std::thread::JoinHandle<Vec<String>>) {
        let (host, remote) = zk_transport::channel_pair("write-failing");
        let context = std::thread::spawn(move || {
            let ready = WorkerFrame::Ready {
                engine: "write-failing".into(),
            };
            remote.send(ready.encode().unwrap());

            let mut ops = Vec::new();
            while let Some(bytes) = remote.recv() {
                let HostFrame::Request(request) = HostFrame::decode(&bytes).unwrap();
                let outcome = match request.op.as_str() {
                    ALLOC_OP => Ok(Value::Number(64)),
                    WRITE_MEMORY_OP => Err(RemoteFault::new(WRITE_MEMORY_OP, "arena is read-only")),
                    _ => Ok(Value::Unit),
                };
                ops.push(request.op.clone());
                let response = WorkerFrame::Response(Response {
                    id: request.id,
                    outcome,
                });
                remote.send(response.encode().unwrap());
                if request.op == DESTROY_OP {
                    break;
                }
            }
            ops
        });
        (Arc::new(TransportClient::new("write-failing", Arc::new(host))), context)
    }

    #[tokio::test]
    async fn test_failed_write_releases_allocation() {
        let (client, context) = spawn_write_failing_context();
        client.open().await.unwrap();
        let proxy = DispatchProxy::new(ENGINE_CAPABILITIES, client);

        let err = proxy.transfer_to_heap(&[1, 2, 3]).await.unwrap_err();
        assert!(err.is_remote());
        proxy.destroy().await;

        let ops = context.join().unwrap();
        assert_eq!(ops, vec![ALLOC_OP, WRITE_MEMORY_OP, FREE_OP, DESTROY_OP]);
    }
}
