//! Linear memory arena.
//!
//! Each execution context owns exactly one arena. Addresses are byte offsets
//! into a single growable buffer; address 0 is never handed out.
//!
//! ## Allocation Policy
//!
//! - Sizes are rounded up to [`ALIGN`] bytes
//! - Freed blocks go to a free list, coalesced with adjacent free blocks
//! - First fit from the free list, otherwise bump from the top
//! - Memory grows on demand up to a fixed capacity

use crate::errors::ArenaError;
use std::collections::{BTreeMap, HashMap};

/// Allocation alignment in bytes.
pub const ALIGN: u64 = 8;

/// Default arena capacity (256 MiB).
pub const DEFAULT_ARENA_CAPACITY: u64 = 256 * 1024 * 1024;

fn align_up(size: u64) -> Option<u64> {
    size.max(1).checked_next_multiple_of(ALIGN)
}

/// A private linear memory with a simple allocator.
#[derive(Debug)]
pub struct MemoryArena {
    memory: Vec<u8>,
    capacity: u64,
    /// First never-allocated byte.
    top: u64,
    /// Live allocations: address -> aligned size.
    live: HashMap<u64, u64>,
    /// Free blocks below `top`: address -> size.
    free: BTreeMap<u64, u64>,
}

impl MemoryArena {
    /// Create an empty arena that may grow to `capacity` bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            memory: Vec::new(),
            capacity,
            top: ALIGN,
            live: HashMap::new(),
            free: BTreeMap::new(),
        }
    }

    /// Allocate `size` bytes and return the address.
    pub fn alloc(&mut self, size: u64) -> Result<u64, ArenaError> {
        let size = align_up(size).ok_or(ArenaError::OutOfMemory {
            requested: size,
            available: self.capacity.saturating_sub(self.top),
        })?;

        let fit = self
            .free
            .iter()
            .find(|(_, &block)| block >= size)
            .map(|(&addr, &block)| (addr, block));

        let addr = match fit {
            Some((addr, block)) => {
                self.free.remove(&addr);
                if block > size {
                    self.free.insert(addr + size, block - size);
                }
                addr
            }
            None => {
                let end = self.top.checked_add(size).unwrap_or(u64::MAX);
                if end > self.capacity {
                    return Err(ArenaError::OutOfMemory {
                        requested: size,
                        available: self.capacity.saturating_sub(self.top),
                    });
                }
                let addr = self.top;
                self.top = end;
                addr
            }
        };

        let end = (addr + size) as usize;
        if self.memory.len() < end {
            self.memory.resize(end, 0);
        }
        self.live.insert(addr, size);
        Ok(addr)
    }

    /// Release an allocation.
    pub fn free(&mut self, addr: u64) -> Result<(), ArenaError> {
        let mut size = self.live.remove(&addr).ok_or(ArenaError::InvalidFree(addr))?;
        let mut start = addr;

        // Merge with the following free block.
        if let Some(next) = self.free.remove(&(start + size)) {
            size += next;
        }
        // Merge with the preceding free block.
        if let Some((&prev, &prev_size)) = self.free.range(..start).next_back() {
            if prev + prev_size == start {
                self.free.remove(&prev);
                start = prev;
                size += prev_size;
            }
        }

        if start + size == self.top {
            self.top = start;
        } else {
            self.free.insert(start, size);
        }
        Ok(())
    }

    /// Copy `bytes` into memory at `addr`.
    pub fn write(&mut self, addr: u64, bytes: &[u8]) -> Result<(), ArenaError> {
        let range = self.checked_range(addr, bytes.len() as u64)?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Borrow `len` bytes at `addr`.
    pub fn read(&self, addr: u64, len: u64) -> Result<&[u8], ArenaError> {
        let range = self.checked_range(addr, len)?;
        Ok(&self.memory[range])
    }

    fn checked_range(&self, addr: u64, len: u64) -> Result<std::ops::Range<usize>, ArenaError> {
        let size = self.memory.len() as u64;
        match addr.checked_add(len) {
            Some(end) if addr >= ALIGN && end <= size => Ok(addr as usize..end as usize),
            _ => Err(ArenaError::OutOfBounds { addr, len, size }),
        }
    }

    /// Total bytes currently allocated.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.live.values().sum()
    }

    /// Number of live allocations.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Arena capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY)
    }
}
