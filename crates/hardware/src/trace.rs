//! Bus and line-state event tracing.
//!
//! The system reports every grant, hold, idle round, line transition,
//! intervention, response and completion as a [`TraceEvent`] to each
//! registered [`TraceSink`]. Two sinks are provided:
//! 1. **[`TraceBuffer`]:** Keeps events in memory for tests and post-run dumps.
//! 2. **[`LogSink`]:** Forwards events to `tracing` at debug/trace level.

use std::io;

use serde::Serialize;
use tracing::{debug, trace};

use crate::agent::LineChange;
use crate::common::{Access, AgentId, Completion};
use crate::protocol::{BusMessage, CoherenceState, MessageKind};

/// One observable step of the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A request won arbitration.
    Grant {
        /// Tick of the event.
        tick: u64,
        /// Requesting agent.
        agent: AgentId,
        /// Line address.
        address: u64,
        /// Granted message kind.
        kind: MessageKind,
    },
    /// A request lost arbitration or targeted a locked line (`HOLD_BUS`).
    Hold {
        /// Tick of the event.
        tick: u64,
        /// Requesting agent.
        agent: AgentId,
        /// Line address.
        address: u64,
        /// Held message kind.
        kind: MessageKind,
    },
    /// No agent requested the bus (`NO_REQ`).
    Idle {
        /// Tick of the event.
        tick: u64,
    },
    /// A line changed state in one agent's directory.
    Transition {
        /// Tick of the event.
        tick: u64,
        /// Agent owning the line.
        agent: AgentId,
        /// Line address.
        address: u64,
        /// State before.
        from: CoherenceState,
        /// State after.
        to: CoherenceState,
        /// Message that caused the change; `None` for local hits and silent evictions.
        kind: Option<MessageKind>,
    },
    /// A snooper supplied dirty data (`C_WB` or `C_FLUSH`).
    Intervention {
        /// Tick of the event.
        tick: u64,
        /// Snooping agent.
        agent: AgentId,
        /// Line address.
        address: u64,
        /// Intervention kind.
        kind: MessageKind,
    },
    /// Memory delivered a response.
    Response {
        /// Tick of the event.
        tick: u64,
        /// Agent the response is addressed to.
        agent: AgentId,
        /// Line address.
        address: u64,
        /// Response kind.
        kind: MessageKind,
    },
    /// An access issued earlier finished.
    Completion {
        /// Tick of the event.
        tick: u64,
        /// Issuing agent.
        agent: AgentId,
        /// Line address.
        address: u64,
        /// The access.
        access: Access,
        /// Payload read or written.
        value: u64,
    },
}

impl TraceEvent {
    /// `Grant` for a winning message.
    pub const fn grant(tick: u64, message: &BusMessage) -> Self {
        Self::Grant {
            tick,
            agent: message.source(),
            address: message.address(),
            kind: message.kind(),
        }
    }

    /// `Hold` for a deferred message.
    pub const fn hold(tick: u64, message: &BusMessage) -> Self {
        Self::Hold {
            tick,
            agent: message.source(),
            address: message.address(),
            kind: message.kind(),
        }
    }

    /// `Intervention` for a snooper's `C_WB`/`C_FLUSH`.
    pub const fn intervention(tick: u64, message: &BusMessage) -> Self {
        Self::Intervention {
            tick,
            agent: message.source(),
            address: message.address(),
            kind: message.kind(),
        }
    }

    /// `Response` for a delivered memory reply.
    pub const fn response(tick: u64, message: &BusMessage) -> Self {
        Self::Response {
            tick,
            agent: message.source(),
            address: message.address(),
            kind: message.kind(),
        }
    }

    /// `Transition` for a recorded line change.
    pub const fn transition(tick: u64, change: &LineChange) -> Self {
        Self::Transition {
            tick,
            agent: change.agent,
            address: change.address,
            from: change.from,
            to: change.to,
            kind: change.cause,
        }
    }

    /// `Completion` for a finished access.
    pub const fn completion(completion: &Completion) -> Self {
        Self::Completion {
            tick: completion.tick,
            agent: completion.agent,
            address: completion.address,
            access: completion.access,
            value: completion.value,
        }
    }

    /// Tick at which the event happened.
    pub const fn tick(&self) -> u64 {
        match *self {
            Self::Grant { tick, .. }
            | Self::Hold { tick, .. }
            | Self::Idle { tick }
            | Self::Transition { tick, .. }
            | Self::Intervention { tick, .. }
            | Self::Response { tick, .. }
            | Self::Completion { tick, .. } => tick,
        }
    }
}

/// Receiver of trace events.
pub trait TraceSink: Send + std::fmt::Debug {
    /// Records one event.
    fn record(&mut self, event: &TraceEvent);

    /// Flushes buffered output and reports the first error seen, if any.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error of a sink that writes to a file or stream.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory event log.
#[derive(Clone, Debug, Default)]
pub struct TraceBuffer {
    events: Vec<TraceEvent>,
}

impl TraceBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Removes and returns all recorded events.
    pub fn take(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl TraceSink for TraceBuffer {
    fn record(&mut self, event: &TraceEvent) {
        self.events.push(*event);
    }
}

/// Forwards events to the `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&mut self, event: &TraceEvent) {
        match *event {
            TraceEvent::Grant { tick, agent, address, kind } => {
                debug!(tick, %agent, address, %kind, "grant");
            }
            TraceEvent::Hold { tick, agent, address, kind } => {
                trace!(tick, %agent, address, %kind, "HOLD_BUS");
            }
            TraceEvent::Idle { tick } => trace!(tick, "NO_REQ"),
            TraceEvent::Transition {
                tick,
                agent,
                address,
                from,
                to,
                kind,
            } => debug!(tick, %agent, address, %from, %to, ?kind, "transition"),
            TraceEvent::Intervention { tick, agent, address, kind } => {
                debug!(tick, %agent, address, %kind, "intervention");
            }
            TraceEvent::Response { tick, agent, address, kind } => {
                debug!(tick, %agent, address, %kind, "response");
            }
            TraceEvent::Completion {
                tick,
                agent,
                address,
                access,
                value,
            } => debug!(tick, %agent, address, ?access, value, "completion"),
        }
    }
}
