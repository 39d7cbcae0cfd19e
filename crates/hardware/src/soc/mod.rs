//! System components.
//!
//! This module organizes the shared side of the coherence domain: the bus
//! arbiter, the memory responder and the builder that assembles them with the
//! agents into a [`System`].

/// Bus arbitration and per-line locking.
pub mod arbiter;

/// System builder and the four-phase tick.
pub mod builder;

/// Memory responder, timing models and backing store.
pub mod memory;

pub use arbiter::{Arbitration, BusArbiter, Submission};
pub use builder::{System, TickReport};
