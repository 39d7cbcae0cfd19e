//! Pseudo-LRU (PLRU) Replacement Policy.
//!
//! One "recently used" bit per way. A touch sets the way's bit; when every bit
//! of a set would be set, the others are cleared. The victim is the lowest way
//! whose bit is clear. Associativity is limited to 64 ways.

use super::ReplacementPolicy;

/// PLRU Policy state.
#[derive(Debug)]
pub struct PlruPolicy {
    bits: Vec<u64>,
    full: u64,
}

impl PlruPolicy {
    /// Creates a policy for `sets` x `ways`.
    pub fn new(sets: usize, ways: usize) -> Self {
        let full = if ways >= 64 { u64::MAX } else { (1u64 << ways) - 1 };
        Self {
            bits: vec![0; sets],
            full,
        }
    }
}

impl ReplacementPolicy for PlruPolicy {
    fn accessed(&mut self, set: usize, way: usize) {
        let mask = 1u64 << (way % 64);
        self.bits[set] |= mask;
        if self.bits[set] & self.full == self.full {
            self.bits[set] = mask;
        }
    }

    fn victim(&self, set: usize) -> usize {
        (!self.bits[set] & self.full).trailing_zeros() as usize % 64
    }
}
