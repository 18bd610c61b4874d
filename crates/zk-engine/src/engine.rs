//! Engine contract.
//!
//! An [`Engine`] is one instance of the native computation engine. It is
//! invoked only by name with raw [`Value`] arguments and may read and write
//! the arena of the execution context that hosts it. An [`EngineFactory`]
//! (the "engine image") produces one fresh instance per pool slot.

use crate::arena::MemoryArena;
use crate::errors::EngineFault;
use std::sync::Arc;
use zk_types::Value;

/// One engine instance, owned by exactly one execution context.
pub trait Engine: Send {
    /// Engine name announced when the context becomes ready.
    fn name(&self) -> &str;

    /// Invoke an operation by name.
    fn call(&mut self, op: &str, args: &[Value], arena: &mut MemoryArena)
        -> Result<Value, EngineFault>;
}

/// Produces engine instances; shared by every slot of a pool.
pub trait EngineFactory: Send + Sync {
    /// Image name (for logs).
    fn name(&self) -> &str;

    /// Create the engine instance for `slot`.
    fn instantiate(&self, slot: usize) -> Result<Box<dyn Engine>, EngineFault>;
}

/// Shared handle to an engine image.
pub type EngineImage = Arc<dyn EngineFactory>;

/// Positional argument accessors that produce engine faults on mismatch.
pub struct Args<'a> {
    op: &'a str,
    args: &'a [Value],
}

impl<'a> Args<'a> {
    /// Wrap the arguments of `op`, checking the count.
    pub fn new(op: &'a str, args: &'a [Value], arity: usize) -> Result<Self, EngineFault> {
        if args.len() != arity {
            return Err(EngineFault::BadArgument {
                op: op.to_string(),
                index: args.len(),
                reason: format!("expected {} arguments, got {}", arity, args.len()),
            });
        }
        Ok(Self { op, args })
    }

    /// Argument `index` as a number.
    pub fn number(&self, index: usize) -> Result<u64, EngineFault> {
        self.args[index]
            .as_number()
            .ok_or_else(|| self.mismatch(index, "number"))
    }

    /// Argument `index` as a byte buffer.
    pub fn bytes(&self, index: usize) -> Result<&'a [u8], EngineFault> {
        self.args[index]
            .as_bytes()
            .ok_or_else(|| self.mismatch(index, "bytes"))
    }

    fn mismatch(&self, index: usize, expected: &str) -> EngineFault {
        EngineFault::BadArgument {
            op: self.op.to_string(),
            index,
            reason: format!("expected {}, got {}", expected, self.args[index].kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_arity() {
        let values = [Value::Number(1)];
        assert!(Args::new("op", &values, 2).is_err());
        assert!(Args::new("op", &values, 1).is_ok());
    }

    #[test]
    fn test_args_kinds() {
        let values = [Value::Number(1), Value::Bytes(vec![9])];
        let args = Args::new("op", &values, 2).unwrap();
        assert_eq!(args.number(0).unwrap(), 1);
        assert_eq!(args.bytes(1).unwrap(), &[9]);
        let err = args.bytes(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument 0 for 'op': expected bytes, got number"
        );
    }
}
