//! Snooping MESI coherence simulator library.
//!
//! This crate models private caches kept coherent over one shared bus:
//! 1. **Protocol:** The 15-kind bus message catalog and the MESI transition table.
//! 2. **Agents:** Per-agent line directories and coherence controllers.
//! 3. **SoC:** Bus arbiter with per-line locking, memory responder and timing models.
//! 4. **Simulation:** Four-phase clocked system, workload parser and driver.
//! 5. **Observability:** Trace events, sinks and statistics.

/// Common types (agent ids, accesses, errors).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Bus messages, coherence states and the transition table.
pub mod protocol;
/// Per-agent line directory and replacement policies.
pub mod cache;
/// Coherence controllers.
pub mod agent;
/// System (arbiter, memory, builder).
pub mod soc;
/// Trace events and sinks.
pub mod trace;
/// Simulation statistics collection and reporting.
pub mod stats;
/// Workload parser and simulation driver.
pub mod sim;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Error raised by the coherence model.
pub use crate::common::CoherenceError;
/// Top-level system; construct with `System::new`.
pub use crate::soc::System;
