//! Backing store behind the memory responder.
//!
//! The contract is a plain line-address keyed get/put. Lines never written
//! read as zero.

use std::collections::HashMap;

/// Line-granular backing memory.
pub trait BackingStore: Send {
    /// Returns the payload stored for `address`.
    fn get(&self, address: u64) -> u64;

    /// Stores `data` for `address`.
    fn put(&mut self, address: u64, data: u64);
}

/// Sparse, zero-initialised memory.
#[derive(Debug, Clone, Default)]
pub struct SparseMemory {
    lines: HashMap<u64, u64>,
}

impl SparseMemory {
    /// Creates an empty memory.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackingStore for SparseMemory {
    fn get(&self, address: u64) -> u64 {
        self.lines.get(&address).copied().unwrap_or(0)
    }

    fn put(&mut self, address: u64, data: u64) {
        let _ = self.lines.insert(address, data);
    }
}
