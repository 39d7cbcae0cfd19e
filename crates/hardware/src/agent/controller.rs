//! Coherence Controller.
//!
//! This module implements the per-agent state machine. It provides:
//! 1. **Local requests:** Loads, stores and flushes either hit in the line
//!    directory or become the agent's single pending request.
//! 2. **Bus requests:** A queued request is turned into a bus message every
//!    tick from the line's *current* state, so a snoop between submission and
//!    grant never leaves a stale message behind.
//! 3. **Evictions:** A miss into a full set first drops a clean victim, or
//!    writes a dirty one back with `WB_REQ` before the miss itself is issued.
//! 4. **Snooping:** Peer requests are run through the transition table,
//!    yielding `C_WB`/`C_FLUSH` interventions for dirty lines.
//! 5. **Completion:** Memory responses install the line and finish the access.
//!
//! # Pending sub-states
//!
//! `Queued` (waiting for arbitration) then `Outstanding` (granted, waiting for
//! memory). While either exists, any access to the same line, and any access
//! that needs the bus, fails with `RequestAlreadyInFlight`.

use tracing::{debug, trace};

use crate::cache::LineDirectory;
use crate::common::error::IllegalTransition;
use crate::common::{Access, AgentId, CoherenceError, Completion, RequestOutcome};
use crate::config::CacheConfig;
use crate::protocol::{BusMessage, CoherenceState, Event, MessageKind, Protocol};

/// A state change of one line, reported for tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineChange {
    /// Agent whose line changed.
    pub agent: AgentId,
    /// Line address.
    pub address: u64,
    /// State before.
    pub from: CoherenceState,
    /// State after.
    pub to: CoherenceState,
    /// Bus message that caused the change, if any.
    pub cause: Option<MessageKind>,
}

/// What a controller did when it snooped a peer's request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnoopReply {
    /// Dirty data supplied to memory (`C_WB` or `C_FLUSH`).
    pub intervention: Option<BusMessage>,
    /// The snooper still holds a valid copy afterwards.
    pub shared: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PendingAccess {
    address: u64,
    access: Access,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pending {
    Queued(PendingAccess),
    Outstanding {
        access: PendingAccess,
        request: BusMessage,
    },
}

impl Pending {
    const fn access(&self) -> PendingAccess {
        match self {
            Self::Queued(a) | Self::Outstanding { access: a, .. } => *a,
        }
    }

    /// Returns `true` if this pending request covers `line`.
    fn blocks(&self, line: u64) -> bool {
        match self {
            Self::Queued(a) => a.address == line,
            Self::Outstanding { access, request } => {
                access.address == line || request.address() == line
            }
        }
    }
}

const fn local_event(access: Access) -> Event {
    match access {
        Access::Read => Event::LocalRead,
        Access::Write(_) => Event::LocalWrite,
        Access::Flush => Event::LocalFlush,
    }
}

/// Per-agent coherence state machine.
#[derive(Debug)]
pub struct Controller {
    id: AgentId,
    directory: LineDirectory,
    protocol: Protocol,
    pending: Option<Pending>,
    holds: u64,
    changes: Vec<LineChange>,
    completions: Vec<Completion>,
}

impl Controller {
    /// Creates a controller whose every line starts `Invalid`.
    pub fn new(id: AgentId, cache: &CacheConfig, protocol: Protocol) -> Self {
        Self {
            id,
            directory: LineDirectory::new(cache),
            protocol,
            pending: None,
            holds: 0,
            changes: Vec::new(),
            completions: Vec::new(),
        }
    }

    /// Agent id.
    #[inline]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// The agent's line directory.
    #[inline]
    pub const fn directory(&self) -> &LineDirectory {
        &self.directory
    }

    /// State of the line containing `addr`.
    pub fn state_of(&self, addr: u64) -> CoherenceState {
        self.directory.lookup(addr)
    }

    /// Line address of the pending request, if any.
    pub fn pending_address(&self) -> Option<u64> {
        self.pending.map(|p| p.access().address)
    }

    /// Returns `true` while the pending request has been granted and waits for memory.
    pub const fn is_outstanding(&self) -> bool {
        matches!(self.pending, Some(Pending::Outstanding { .. }))
    }

    /// Drains line state changes recorded since the last call.
    pub fn take_changes(&mut self) -> Vec<LineChange> {
        std::mem::take(&mut self.changes)
    }

    /// Drains accesses completed by bus activity since the last call.
    pub fn take_completions(&mut self) -> Vec<Completion> {
        std::mem::take(&mut self.completions)
    }

    fn illegal(&self, address: u64, source: IllegalTransition) -> CoherenceError {
        CoherenceError::IllegalTransition {
            agent: self.id,
            address,
            source,
        }
    }

    fn record(
        &mut self,
        address: u64,
        from: CoherenceState,
        to: CoherenceState,
        cause: Option<MessageKind>,
    ) {
        if from == to {
            return;
        }
        debug!(agent = %self.id, address, %from, %to, ?cause, "line transition");
        self.changes.push(LineChange {
            agent: self.id,
            address,
            from,
            to,
            cause,
        });
    }

    /// Accepts a local load, store or flush.
    ///
    /// # Returns
    ///
    /// `Hit` with the line payload when the access completes locally (a flush
    /// of a line that is not resident is a no-op hit), otherwise `Pending`.
    ///
    /// # Errors
    ///
    /// * [`CoherenceError::RequestAlreadyInFlight`] if the access needs the
    ///   bus, or touches the pending line, while a request is pending.
    /// * [`CoherenceError::IllegalTransition`] on a protocol bug.
    pub fn request(
        &mut self,
        address: u64,
        access: Access,
    ) -> Result<RequestOutcome, CoherenceError> {
        let line = self.directory.align(address);
        if let Some(pending) = self.pending
            && pending.blocks(line)
        {
            return Err(CoherenceError::RequestAlreadyInFlight {
                agent: self.id,
                address: line,
            });
        }

        let state = self.directory.lookup(line);
        let row = self
            .protocol
            .transition(state, local_event(access))
            .map_err(|e| self.illegal(line, e))?;

        if row.is_silent() {
            let value = self.apply_hit(line, access)?;
            return Ok(RequestOutcome::Hit(value));
        }

        if let Some(pending) = self.pending {
            return Err(CoherenceError::RequestAlreadyInFlight {
                agent: self.id,
                address: pending.access().address,
            });
        }
        self.pending = Some(Pending::Queued(PendingAccess {
            address: line,
            access,
        }));
        Ok(RequestOutcome::Pending)
    }

    /// Performs an access that needs no bus transaction.
    fn apply_hit(&mut self, line: u64, access: Access) -> Result<u64, CoherenceError> {
        if access == Access::Flush {
            return Ok(0);
        }
        let event = local_event(access);
        let Some(entry) = self.directory.hit(line) else {
            return Err(self.illegal(
                line,
                IllegalTransition {
                    state: CoherenceState::Invalid,
                    event,
                },
            ));
        };
        let from = entry.state;
        let value = match access {
            Access::Write(v) => {
                entry.state = CoherenceState::Modified;
                entry.data = v;
                v
            }
            _ => entry.data,
        };
        self.record(line, from, self.directory.lookup(line), None);
        Ok(value)
    }

    /// Produces this tick's bus request, if the agent needs the bus.
    ///
    /// The message is derived from the current line state. A dirty victim in
    /// the way of a miss is written back first (`WB_REQ`); a clean one is
    /// dropped silently. If a snoop made the pending access silent (e.g. a
    /// flush of a line that has since been invalidated), the access completes
    /// here without a message.
    ///
    /// # Errors
    ///
    /// [`CoherenceError::IllegalTransition`] on a protocol bug.
    pub fn bus_request(&mut self, tick: u64) -> Result<Option<BusMessage>, CoherenceError> {
        let Some(Pending::Queued(pending)) = self.pending else {
            return Ok(None);
        };
        let line = pending.address;
        let state = self.directory.lookup(line);
        let row = self
            .protocol
            .transition(state, local_event(pending.access))
            .map_err(|e| self.illegal(line, e))?;

        let Some(kind) = row.emit else {
            let value = self.apply_hit(line, pending.access)?;
            self.pending = None;
            self.completions.push(Completion {
                agent: self.id,
                address: line,
                access: pending.access,
                value,
                tick,
            });
            return Ok(None);
        };

        if !state.is_valid()
            && let Some(victim) = self.directory.victim_for(line)
        {
            let evict = self
                .protocol
                .transition(victim.state, Event::Evict)
                .map_err(|e| self.illegal(victim.address, e))?;
            match evict.emit {
                Some(wb) => {
                    return Ok(Some(BusMessage::with_payload(
                        wb,
                        self.id,
                        victim.address,
                        victim.data,
                    )));
                }
                None => {
                    let _ = self.directory.invalidate(victim.address);
                    self.record(victim.address, victim.state, evict.next, None);
                }
            }
        }

        let message = match (kind, self.directory.entry(line)) {
            (MessageKind::Flush, Some(entry)) => {
                BusMessage::with_payload(kind, self.id, line, entry.data)
            }
            _ => BusMessage::new(kind, self.id, line),
        };
        Ok(Some(message))
    }

    /// Notes that `request` won arbitration.
    pub fn granted(&mut self, request: BusMessage) {
        if let Some(Pending::Queued(access)) = self.pending {
            self.pending = Some(Pending::Outstanding { access, request });
        }
    }

    /// Notes that `request` lost arbitration or hit a locked line (`HOLD_BUS`).
    ///
    /// Nothing is retained; the next [`Controller::bus_request`] rebuilds the
    /// message from the line state at that time.
    pub fn held(&mut self, request: BusMessage) {
        self.holds += 1;
        trace!(agent = %self.id, %request, "held");
    }

    /// Number of times this agent's request was held.
    pub const fn holds(&self) -> u64 {
        self.holds
    }

    /// Reacts to a peer's granted request.
    ///
    /// # Errors
    ///
    /// [`CoherenceError::IllegalTransition`] on a protocol bug.
    pub fn snoop(&mut self, message: &BusMessage) -> Result<SnoopReply, CoherenceError> {
        let line = self.directory.align(message.address());
        let state = self.directory.lookup(line);
        let Some(event) = Event::from_snoop(message.kind()) else {
            return Ok(SnoopReply {
                intervention: None,
                shared: state.is_valid(),
            });
        };

        let row = self
            .protocol
            .transition(state, event)
            .map_err(|e| self.illegal(line, e))?;
        let intervention = match row.emit {
            Some(MessageKind::CWb) => self.directory.writeback_if_dirty(line, self.id),
            Some(kind) => {
                let data = self.directory.entry(line).map_or(0, |e| e.data);
                Some(BusMessage::with_payload(kind, self.id, line, data))
            }
            None => None,
        };

        if row.next != state {
            let _ = self.directory.set_state(line, row.next);
            self.record(line, state, row.next, Some(message.kind()));
        }
        Ok(SnoopReply {
            intervention,
            shared: row.next.is_valid(),
        })
    }

    /// Applies a memory response addressed to this agent.
    ///
    /// # Returns
    ///
    /// The finished access, or `None` when the response only acknowledged a
    /// victim writeback and the original miss is queued again.
    ///
    /// # Errors
    ///
    /// [`CoherenceError::IllegalTransition`] if the response does not match
    /// the outstanding request, or the fill has no legal row.
    pub fn complete(
        &mut self,
        response: &BusMessage,
        tick: u64,
    ) -> Result<Option<Completion>, CoherenceError> {
        let kind = response.kind();
        let line = self.directory.align(response.address());
        let unexpected = |this: &Self| {
            this.illegal(
                line,
                IllegalTransition {
                    state: this.directory.lookup(line),
                    event: Event::Response(kind),
                },
            )
        };

        let Some(Pending::Outstanding { access, request }) = self.pending else {
            return Err(unexpected(self));
        };
        if request.address() != line {
            return Err(unexpected(self));
        }

        match request.kind() {
            MessageKind::WbReq => {
                if kind != MessageKind::EnAccess {
                    return Err(unexpected(self));
                }
                if let Some(victim) = self.directory.invalidate(line) {
                    self.record(line, victim.state, CoherenceState::Invalid, Some(kind));
                }
                self.pending = Some(Pending::Queued(access));
                Ok(None)
            }
            MessageKind::Flush | MessageKind::FlushS => {
                if kind != MessageKind::EnAccess {
                    return Err(unexpected(self));
                }
                if let Some(entry) = self.directory.invalidate(line) {
                    self.record(line, entry.state, CoherenceState::Invalid, Some(kind));
                }
                self.pending = None;
                Ok(Some(Completion {
                    agent: self.id,
                    address: line,
                    access: access.access,
                    value: 0,
                    tick,
                }))
            }
            _ => self.fill(access, response, tick).map(Some),
        }
    }

    /// Installs the line for a completed miss or upgrade and performs the access.
    fn fill(
        &mut self,
        pending: PendingAccess,
        response: &BusMessage,
        tick: u64,
    ) -> Result<Completion, CoherenceError> {
        let line = pending.address;
        let kind = response.kind();
        let state = self.directory.lookup(line);
        let row = self
            .protocol
            .transition(state, Event::Response(kind))
            .map_err(|e| self.illegal(line, e))?;

        let current = self.directory.entry(line).map_or(0, |e| e.data);
        let mut data = response.payload().unwrap_or(current);
        if let Access::Write(v) = pending.access {
            data = v;
        }

        if let Some(displaced) = self.directory.install(line, row.next, data) {
            if displaced.dirty() {
                return Err(CoherenceError::InvariantViolation {
                    address: displaced.address,
                    detail: format!("{} displaced a dirty line without writeback", self.id),
                });
            }
            self.record(displaced.address, displaced.state, CoherenceState::Invalid, None);
        }
        self.record(line, state, row.next, Some(kind));

        self.pending = None;
        Ok(Completion {
            agent: self.id,
            address: line,
            access: pending.access,
            value: data,
            tick,
        })
    }
}
