//! Line Directory Replacement Policies.
//!
//! Victim selection for full sets of a [`LineDirectory`](super::LineDirectory).
//!
//! # Policies
//!
//! - `Fifo`: First-In, First-Out.
//! - `Lru`: Least Recently Used.
//! - `Mru`: Most Recently Used.
//! - `Plru`: Pseudo-LRU (one MRU bit per way).
//! - `Random`: xorshift pseudo-random selection.
//!
//! Choosing a victim does not change policy state: a controller may ask for
//! the victim, write it back over several ticks, and only then fill the way.

use std::fmt;

use crate::config::ReplacementPolicy as PolicyType;

/// First-In, First-Out replacement policy.
pub mod fifo;

/// Least Recently Used replacement policy.
pub mod lru;

/// Most Recently Used replacement policy.
pub mod mru;

/// Pseudo-LRU replacement policy.
pub mod plru;

/// Random replacement policy.
pub mod random;

pub use fifo::FifoPolicy;
pub use lru::LruPolicy;
pub use mru::MruPolicy;
pub use plru::PlruPolicy;
pub use random::RandomPolicy;

/// Interface for replacement policies.
pub trait ReplacementPolicy: Send + Sync + fmt::Debug {
    /// Records a hit on `way` of `set`.
    fn accessed(&mut self, set: usize, way: usize);

    /// Records a fill into `way` of `set`. Defaults to [`Self::accessed`].
    fn inserted(&mut self, set: usize, way: usize) {
        self.accessed(set, way);
    }

    /// Returns the way that a fill into a full `set` would displace.
    fn victim(&self, set: usize) -> usize;
}

/// Builds the configured policy for a directory of `sets` x `ways`.
pub fn build(kind: PolicyType, sets: usize, ways: usize) -> Box<dyn ReplacementPolicy> {
    match kind {
        PolicyType::Fifo => Box::new(FifoPolicy::new(sets, ways)),
        PolicyType::Random => Box::new(RandomPolicy::new(sets, ways)),
        PolicyType::Plru => Box::new(PlruPolicy::new(sets, ways)),
        PolicyType::Lru => Box::new(LruPolicy::new(sets, ways)),
        PolicyType::Mru => Box::new(MruPolicy::new(sets, ways)),
    }
}
