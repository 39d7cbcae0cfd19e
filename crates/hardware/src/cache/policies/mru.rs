//! Most Recently Used (MRU) Replacement Policy.
//!
//! Evicts the line touched last. Useful for cyclic sweeps over a working set
//! larger than the directory, where the newest line is the one needed latest.

use super::ReplacementPolicy;

/// MRU Policy state.
#[derive(Debug)]
pub struct MruPolicy {
    last: Vec<usize>,
}

impl MruPolicy {
    /// Creates a policy for `sets` sets; the associativity is not needed.
    pub fn new(sets: usize, _ways: usize) -> Self {
        Self {
            last: vec![0; sets],
        }
    }
}

impl ReplacementPolicy for MruPolicy {
    fn accessed(&mut self, set: usize, way: usize) {
        self.last[set] = way;
    }

    fn victim(&self, set: usize) -> usize {
        self.last[set]
    }
}
