//! # Typed Engine Interface
//!
//! [`engine_interface!`] turns one operation table into both the engine's
//! [`CapabilityDescriptor`] and a typed async wrapper with one method per
//! operation. Arguments convert into [`Value`]s; results are checked against
//! the declared return kind.
//!
//! ```rust,ignore
//! engine_interface! {
//!     pub struct MyWorker;
//!     pub const MY_CAPABILITIES = ("my-engine", 1);
//!
//!     fn fft = "fft"(domain, coeffs_addr) -> Vec<u8>;
//! }
//! ```

use crate::errors::DispatchError;
use crate::proxy::{expect_bytes, expect_number};
use zk_types::{Value, ValueKind};

/// Conversion from a raw call result into a typed one.
pub trait FromValue: Sized {
    fn from_value(op: &str, value: Value) -> Result<Self, DispatchError>;
}

impl FromValue for u64 {
    fn from_value(op: &str, value: Value) -> Result<Self, DispatchError> {
        expect_number(op, value)
    }
}

impl FromValue for Vec<u8> {
    fn from_value(op: &str, value: Value) -> Result<Self, DispatchError> {
        expect_bytes(op, value)
    }
}

impl FromValue for () {
    fn from_value(op: &str, value: Value) -> Result<Self, DispatchError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(DispatchError::UnexpectedResult {
                op: op.to_string(),
                expected: ValueKind::Unit,
                actual: other.kind(),
            }),
        }
    }
}

impl FromValue for Value {
    fn from_value(_op: &str, value: Value) -> Result<Self, DispatchError> {
        Ok(value)
    }
}

/// Generate a capability descriptor and a typed worker over a
/// [`DispatchProxy`](crate::DispatchProxy).
#[macro_export]
macro_rules! engine_interface {
    (@count) => { 0usize };
    (@count $head:ident $($tail:ident)*) => { 1usize + $crate::engine_interface!(@count $($tail)*) };

    (
        $(#[$meta:meta])*
        $vis:vis struct $worker:ident;
        $desc_vis:vis const $desc:ident = ($engine:literal, $version:literal);

        $(
            $(#[$op_meta:meta])*
            fn $method:ident = $op:literal ( $($arg:ident),* ) -> $ret:ty;
        )*
    ) => {
        $desc_vis const $desc: $crate::__private::CapabilityDescriptor =
            $crate::__private::CapabilityDescriptor::new(
                $engine,
                $version,
                &[$($crate::__private::OpSpec::new($op, $crate::engine_interface!(@count $($arg)*)),)*],
            );

        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $worker {
            proxy: ::std::sync::Arc<$crate::DispatchProxy>,
        }

        impl $worker {
            /// Wrap an open transport client.
            pub fn new(client: ::std::sync::Arc<$crate::__private::TransportClient>) -> Self {
                Self {
                    proxy: ::std::sync::Arc::new($crate::DispatchProxy::new($desc, client)),
                }
            }

            /// The untyped proxy underneath.
            pub fn proxy(&self) -> &$crate::DispatchProxy {
                &self.proxy
            }

            $(
                $(#[$op_meta])*
                pub async fn $method(
                    &self,
                    $($arg: impl Into<$crate::__private::Value>),*
                ) -> Result<$ret, $crate::DispatchError> {
                    let value = self.proxy.call($op, vec![$($arg.into()),*]).await?;
                    <$ret as $crate::FromValue>::from_value($op, value)
                }
            )*
        }
    };
}

engine_interface! {
    /// Typed handle to one execution context running the prover engine.
    pub struct EngineWorker;
    pub const ENGINE_CAPABILITIES = ("zk-engine", 1);

    /// Allocate bytes in the context's arena.
    fn bbmalloc = "bbmalloc"(size) -> u64;
    /// Release an arena allocation.
    fn bbfree = "bbfree"(addr) -> ();
    fn write_memory = "write_memory"(addr, bytes) -> ();
    fn read_memory = "read_memory"(addr, len) -> Vec<u8>;
    /// Load a point table; returns its handle.
    fn new_pippenger = "new_pippenger"(points_addr, num_points) -> u64;
    /// MSM of `range` scalars against points `from..from + range`.
    fn pippenger_unsafe = "pippenger_unsafe"(handle, scalars_addr, from, range) -> Vec<u8>;
    fn new_evaluation_domain = "new_evaluation_domain"(size) -> u64;
    /// Transform of `size / stride` coefficients over the subgroup of order
    /// `size / stride`.
    fn fft_partial = "fft_partial"(domain, coeffs_addr, stride) -> Vec<u8>;
    /// Evaluations at `omega^from .. omega^(from + count)` from `stride`
    /// concatenated partial transforms.
    fn fft_merge_range = "fft_merge_range"(domain, partials_addr, stride, from, count) -> Vec<u8>;
    fn fft = "fft"(domain, coeffs_addr) -> Vec<u8>;
    fn get_exact_circuit_size = "get_exact_circuit_size"(cs_addr, cs_len) -> u64;
}

impl EngineWorker {
    /// See [`DispatchProxy::transfer_to_heap`](crate::DispatchProxy::transfer_to_heap).
    pub async fn transfer_to_heap(&self, bytes: &[u8]) -> Result<u64, DispatchError> {
        self.proxy.transfer_to_heap(bytes).await
    }

    /// See [`DispatchProxy::transfer_from_heap`](crate::DispatchProxy::transfer_from_heap).
    pub async fn transfer_from_heap(&self, addr: u64, len: u64) -> Result<Vec<u8>, DispatchError> {
        self.proxy.transfer_from_heap(addr, len).await
    }

    /// Tear down the context. Idempotent.
    pub async fn destroy(&self) {
        self.proxy.destroy().await;
    }
}
