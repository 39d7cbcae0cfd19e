//! First-In, First-Out (FIFO) Replacement Policy.
//!
//! Round-robin pointer per set, advanced only when a fill lands on the way it
//! points at. Hits do not affect the order.

use super::ReplacementPolicy;

/// FIFO Policy state.
#[derive(Debug)]
pub struct FifoPolicy {
    next_way: Vec<usize>,
    ways: usize,
}

impl FifoPolicy {
    /// Creates a policy for `sets` x `ways`.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            next_way: vec![0; sets],
            ways,
        }
    }
}

impl ReplacementPolicy for FifoPolicy {
    fn accessed(&mut self, _set: usize, _way: usize) {}

    fn inserted(&mut self, set: usize, way: usize) {
        if self.next_way[set] == way {
            self.next_way[set] = (way + 1) % self.ways;
        }
    }

    fn victim(&self, set: usize) -> usize {
        self.next_way[set]
    }
}
