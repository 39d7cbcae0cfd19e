//! Agents and their coherence controllers.
//!
//! An agent is one private cache on the bus. All of its state lives in its
//! [`Controller`]: the agent id, the line directory and the single request
//! it may have in flight.

/// Per-agent coherence state machine.
pub mod controller;

pub use controller::{Controller, LineChange, SnoopReply};
