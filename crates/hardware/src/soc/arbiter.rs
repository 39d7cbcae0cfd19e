//! Bus Arbiter.
//!
//! This module serializes all bus requests into one global order. It provides:
//! 1. **Submission:** Each requester may offer one message per tick.
//! 2. **Arbitration:** At most one message is granted per tick. Ties go to the
//!    lowest agent id; the external flush port has the lowest priority.
//! 3. **Line serialization:** A line with a granted transaction still waiting
//!    for its memory response is locked. Requests for it receive `HOLD_BUS`
//!    until [`BusArbiter::release`] is called, so an RFO and a writeback to the
//!    same line can never overlap.
//!
//! `HOLD_BUS` is flow control, not an error: the requester resubmits on a later tick.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::common::{AgentId, CoherenceError};
use crate::protocol::{BusMessage, MessageClass};

/// Answer to a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The message takes part in this tick's arbitration.
    Accepted,
    /// The message's line is locked; resubmit on a later tick.
    HoldBus,
}

/// Result of one arbitration round.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Arbitration {
    /// The winning message, if anyone submitted.
    pub granted: Option<BusMessage>,
    /// Candidates that lost and must resubmit.
    pub held: Vec<BusMessage>,
}

/// Single-winner-per-tick arbiter with per-line locking.
#[derive(Debug, Default)]
pub struct BusArbiter {
    candidates: BTreeMap<AgentId, BusMessage>,
    locked: BTreeSet<u64>,
    grants: u64,
    holds: u64,
    idle: u64,
}

impl BusArbiter {
    /// Creates an arbiter with no candidates and no locked lines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers `message` from `agent` for this tick's arbitration.
    ///
    /// # Errors
    ///
    /// Returns [`CoherenceError::DuplicateSubmission`] if `agent` already
    /// submitted this tick.
    pub fn submit(
        &mut self,
        agent: AgentId,
        message: BusMessage,
    ) -> Result<Submission, CoherenceError> {
        if self.candidates.contains_key(&agent) {
            return Err(CoherenceError::DuplicateSubmission(agent));
        }
        if self.is_locked(message.address()) {
            self.holds += 1;
            trace!(%agent, %message, "line busy, HOLD_BUS");
            return Ok(Submission::HoldBus);
        }
        let _ = self.candidates.insert(agent, message);
        Ok(Submission::Accepted)
    }

    /// Grants at most one of this tick's candidates.
    ///
    /// The winner's line is locked until [`BusArbiter::release`]. Every other
    /// candidate is returned in `held`, in priority order.
    pub fn arbitrate(&mut self) -> Arbitration {
        let mut round = std::mem::take(&mut self.candidates).into_values();
        let Some(winner) = round.next() else {
            self.idle += 1;
            return Arbitration::default();
        };

        if winner.kind().class() == MessageClass::Request {
            let _ = self.locked.insert(winner.address());
        }
        self.grants += 1;

        let held: Vec<BusMessage> = round.collect();
        self.holds += held.len() as u64;
        Arbitration {
            granted: Some(winner),
            held,
        }
    }

    /// Unlocks a line once its transaction has completed.
    ///
    /// # Returns
    ///
    /// `false` if the line was not locked.
    pub fn release(&mut self, address: u64) -> bool {
        self.locked.remove(&address)
    }

    /// Returns `true` if `address` has a granted transaction in flight.
    pub fn is_locked(&self, address: u64) -> bool {
        self.locked.contains(&address)
    }

    /// Number of messages granted so far.
    pub const fn grants(&self) -> u64 {
        self.grants
    }

    /// Number of `HOLD_BUS` deferrals handed out so far.
    pub const fn holds(&self) -> u64 {
        self.holds
    }

    /// Number of arbitration rounds with no candidate (`NO_REQ`).
    pub const fn idle_rounds(&self) -> u64 {
        self.idle
    }
}
