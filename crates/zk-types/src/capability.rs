//! Capability descriptors.
//!
//! A descriptor is the compile-time table of operations one engine version
//! exposes. Proxies validate every call against it before anything is sent.

use std::fmt;

/// One named operation with a fixed argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSpec {
    /// Operation name as understood by the engine.
    pub name: &'static str,
    /// Exact number of arguments.
    pub arity: usize,
}

impl OpSpec {
    /// Declare an operation.
    #[must_use]
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }
}

/// The immutable set of operations exposed by an engine version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    /// Engine family name (for logs).
    pub name: &'static str,
    /// Engine version the table was written against.
    pub version: u32,
    /// Declared operations.
    pub ops: &'static [OpSpec],
}

impl CapabilityDescriptor {
    /// Build a descriptor from a static table.
    #[must_use]
    pub const fn new(name: &'static str, version: u32, ops: &'static [OpSpec]) -> Self {
        Self { name, version, ops }
    }

    /// Find an operation by name.
    #[must_use]
    pub fn lookup(&self, op: &str) -> Option<&OpSpec> {
        self.ops.iter().find(|spec| spec.name == op)
    }

    /// Whether the descriptor declares `op`.
    #[must_use]
    pub fn supports(&self, op: &str) -> bool {
        self.lookup(op).is_some()
    }

    /// Iterate over declared operation names.
    pub fn op_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ops.iter().map(|spec| spec.name)
    }
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} ({} ops)", self.name, self.version, self.ops.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPS: &[OpSpec] = &[OpSpec::new("bbmalloc", 1), OpSpec::new("fft", 2)];
    const DESC: CapabilityDescriptor = CapabilityDescriptor::new("test-engine", 3, OPS);

    #[test]
    fn test_lookup() {
        assert_eq!(DESC.lookup("fft").map(|s| s.arity), Some(2));
        assert!(DESC.lookup("ifft").is_none());
        assert!(DESC.supports("bbmalloc"));
    }

    #[test]
    fn test_op_names_in_declaration_order() {
        let names: Vec<_> = DESC.op_names().collect();
        assert_eq!(names, vec!["bbmalloc", "fft"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(DESC.to_string(), "test-engine v3 (2 ops)");
    }
}
