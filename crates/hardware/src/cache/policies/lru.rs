//! Least Recently Used (LRU) Replacement Policy.
//!
//! Keeps a recency stack per set. Index 0 is the most recently used way and
//! the last index is the victim.
//!
//! - `accessed()`: O(W)
//! - `victim()`: O(1)

use super::ReplacementPolicy;

/// LRU Policy state.
#[derive(Debug)]
pub struct LruPolicy {
    stacks: Vec<Vec<usize>>,
}

impl LruPolicy {
    /// Creates a policy for `sets` x `ways`, every set ordered `0..ways`.
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            stacks: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    fn accessed(&mut self, set: usize, way: usize) {
        let stack = &mut self.stacks[set];
        if let Some(pos) = stack.iter().position(|&w| w == way) {
            let _ = stack.remove(pos);
        }
        stack.insert(0, way);
    }

    fn victim(&self, set: usize) -> usize {
        self.stacks[set].last().copied().unwrap_or(0)
    }
}
