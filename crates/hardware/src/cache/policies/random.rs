//! Random Replacement Policy.
//!
//! A xorshift64 generator steps on every fill and hit; the victim is derived
//! from its current value. Runs are reproducible for a given access stream.

use super::ReplacementPolicy;

/// Random Policy state.
#[derive(Debug)]
pub struct RandomPolicy {
    ways: usize,
    state: u64,
}

impl RandomPolicy {
    /// Creates a policy with a fixed seed; the set count is not needed.
    pub const fn new(_sets: usize, ways: usize) -> Self {
        Self {
            ways,
            state: 0x2545_F491_4F6C_DD1D,
        }
    }

    const fn step(mut x: u64) -> u64 {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn accessed(&mut self, _set: usize, _way: usize) {
        self.state = Self::step(self.state);
    }

    fn victim(&self, set: usize) -> usize {
        (Self::step(self.state ^ set as u64) % self.ways as u64) as usize
    }
}
