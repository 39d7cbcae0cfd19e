//! Simulator: feeds a workload into a system and runs it to completion.
//!
//! Each agent issues its accesses in file order. Accesses that hit complete
//! immediately and the agent moves on; a miss occupies the agent until its
//! completion. An access rejected with `RequestAlreadyInFlight` is retried on
//! the next tick, so two accesses to the same line never overtake each other.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::common::{CoherenceError, RequestOutcome};
use crate::sim::workload::{Workload, WorkloadOp};
use crate::soc::System;

/// Outcome of [`Simulator::run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Accesses issued to the system.
    pub issued: u64,
    /// Accesses completed, hits included.
    pub completed: u64,
    /// `true` if every access completed before the tick limit.
    pub finished: bool,
}

/// Workload driver.
#[derive(Debug)]
pub struct Simulator {
    /// The system being driven.
    pub system: System,
    queues: Vec<VecDeque<WorkloadOp>>,
    issued: u64,
    completed: u64,
}

impl Simulator {
    /// Creates a simulator over `system`.
    ///
    /// External flushes are queued on the system's flush port immediately;
    /// agent accesses are split into per-agent queues.
    pub fn new(mut system: System, workload: &Workload) -> Self {
        let agents = workload.max_agent().map_or(0, |a| a.index() + 1);
        let mut queues = vec![VecDeque::new(); agents];
        let mut issued = 0;
        for op in &workload.ops {
            if op.agent.is_external() {
                system.request_flush(op.address);
                issued += 1;
            } else {
                queues[op.agent.index()].push_back(*op);
            }
        }
        Self {
            system,
            queues,
            issued,
            completed: 0,
        }
    }

    /// Number of accesses not yet issued.
    pub fn remaining(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Offers each agent's next accesses to the system.
    fn issue(&mut self) -> Result<(), CoherenceError> {
        for queue in &mut self.queues {
            while let Some(op) = queue.front().copied() {
                match self.system.request(op.agent, op.address, op.access) {
                    Ok(RequestOutcome::Hit(_)) => {
                        self.issued += 1;
                        self.completed += 1;
                        let _ = queue.pop_front();
                    }
                    Ok(RequestOutcome::Pending) => {
                        self.issued += 1;
                        let _ = queue.pop_front();
                        break;
                    }
                    Err(CoherenceError::RequestAlreadyInFlight { .. }) => break,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    /// Advances the simulation by one tick.
    ///
    /// # Errors
    ///
    /// Any fatal [`CoherenceError`] from the system.
    pub fn tick(&mut self) -> Result<(), CoherenceError> {
        self.issue()?;
        let report = self.system.tick()?;
        self.completed += report.completions.len() as u64;
        Ok(())
    }

    /// Runs until every access has completed or `max_ticks` ticks have elapsed.
    ///
    /// # Errors
    ///
    /// Any fatal [`CoherenceError`] from the system.
    pub fn run(&mut self, max_ticks: u64) -> Result<RunSummary, CoherenceError> {
        let start = self.system.current_tick();
        loop {
            let done = self.remaining() == 0 && self.system.is_quiescent();
            let elapsed = self.system.current_tick() - start;
            if done || elapsed >= max_ticks {
                if !done {
                    warn!(max_ticks, remaining = self.remaining(), "tick limit reached");
                }
                let summary = RunSummary {
                    ticks: elapsed,
                    issued: self.issued,
                    completed: self.completed,
                    finished: done,
                };
                debug!(?summary, "run finished");
                return Ok(summary);
            }
            self.tick()?;
        }
    }
}
