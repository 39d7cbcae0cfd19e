//! Common types shared by every component of the coherence simulator.
//!
//! This module provides the small vocabulary the rest of the crate is written in:
//! 1. **Identifiers:** Agent identifiers and line-address alignment.
//! 2. **Accesses:** Load/store/flush requests, their outcomes and completions.
//! 3. **Error Handling:** Fatal protocol errors and recoverable back-pressure.

/// Agent identifiers and line-address helpers.
pub mod addr;

/// Access request and completion types.
pub mod data;

/// Error types for the protocol, configuration and workload layers.
pub mod error;

pub use addr::{AgentId, line_base};
pub use data::{Access, Completion, RequestOutcome};
pub use error::{CoherenceError, ConfigError, WorkloadError};
