//! Error definitions.
//!
//! This module defines the error taxonomy of the simulator. It provides:
//! 1. **Fatal protocol errors:** Malformed messages, illegal transitions and
//!    invariant violations. These abort a simulation run.
//! 2. **Back-pressure:** `RequestAlreadyInFlight`, which the issuing agent
//!    recovers from by retrying on a later tick.
//! 3. **Setup errors:** Configuration and workload parsing failures.
//!
//! Arbitration deferral (`HOLD_BUS`) is a normal flow-control value and is not
//! represented here.

use std::io;

use thiserror::Error;

use super::addr::AgentId;
use crate::protocol::state::CoherenceState;
use crate::protocol::transition::Event;

/// A `(state, event)` pair with no row in the transition table.
///
/// Always a controller bug; the run must not continue past it.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("no transition for {event} in state {state}")]
pub struct IllegalTransition {
    /// State the line was in.
    pub state: CoherenceState,
    /// Event that had no matching row.
    pub event: Event,
}

/// Errors raised while running the coherence model.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoherenceError {
    /// A bus message was built from an encoding outside the catalog.
    #[error("invalid bus message kind encoding {0:#x}")]
    InvalidMessageKind(u8),

    /// A controller hit an event with no legal transition.
    #[error("agent {agent} line {address:#x}: {source}")]
    IllegalTransition {
        /// Agent whose controller raised the error.
        agent: AgentId,
        /// Line address involved.
        address: u64,
        /// The offending state/event pair.
        #[source]
        source: IllegalTransition,
    },

    /// The system-wide single-writer/multiple-reader invariant failed.
    #[error("coherence invariant violated at line {address:#x}: {detail}")]
    InvariantViolation {
        /// Line address whose holders disagree.
        address: u64,
        /// Human-readable description of the holders.
        detail: String,
    },

    /// The agent already waits on a bus transaction; retry on a later tick.
    #[error("agent {agent} already has a request in flight for line {address:#x}")]
    RequestAlreadyInFlight {
        /// Agent that was busy.
        agent: AgentId,
        /// Line of the request still in flight.
        address: u64,
    },

    /// The request named an agent that does not exist.
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),

    /// An agent submitted more than one bus request in the same tick.
    #[error("agent {0} submitted more than one bus request in a single tick")]
    DuplicateSubmission(AgentId),
}

impl CoherenceError {
    /// Returns `true` for errors that must halt the simulation.
    ///
    /// `RequestAlreadyInFlight` is the only recoverable condition.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::RequestAlreadyInFlight { .. })
    }
}

/// Errors raised while loading or validating a [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// The configuration JSON was malformed or had wrong field types.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A field held a value the model cannot run with.
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Errors raised while reading a workload file.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// The workload file could not be read.
    #[error("failed to read workload: {0}")]
    Io(#[from] io::Error),

    /// A line of the workload could not be parsed.
    #[error("workload line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },
}
