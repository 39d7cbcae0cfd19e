//! Workload loading and simulation driving.
//!
//! Provides the workload file parser and the [`Simulator`] that feeds parsed
//! accesses into a [`crate::soc::System`] until every access has completed.

/// Workload driver over a system.
pub mod simulator;

/// Workload file parser.
pub mod workload;

pub use simulator::{RunSummary, Simulator};
pub use workload::{Workload, WorkloadOp};
