//! System construction and the top-level `System` type.
//!
//! This module assembles the agents, the bus arbiter and the memory responder
//! from configuration and drives them with one global clock. Each tick runs
//! four phases:
//! 1. **Submit:** Every controller offers at most one bus request, rebuilt from
//!    its current line state; the external flush port offers `REQ_FLUSH`.
//! 2. **Arbitrate:** At most one request is granted; the rest are held.
//! 3. **Snoop:** Every agent other than the requester snoops the winner in
//!    agent-id order. Interventions reach memory before any fill is produced.
//! 4. **Respond:** Memory schedules its reply, then every reply due this tick
//!    is delivered and the line lock is released.

use std::collections::{BTreeMap, VecDeque};
use std::io;

use crate::agent::{Controller, LineChange};
use crate::common::{Access, AgentId, CoherenceError, Completion, ConfigError, RequestOutcome};
use crate::config::Config;
use crate::protocol::{BusMessage, CoherenceState, Event, MessageKind, Protocol};
use crate::soc::arbiter::{BusArbiter, Submission};
use crate::soc::memory::MemoryResponder;
use crate::soc::memory::store::BackingStore;
use crate::stats::CoherenceStats;
use crate::trace::{TraceBuffer, TraceEvent, TraceSink};

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// The tick that was executed.
    pub tick: u64,
    /// The request granted this tick.
    pub granted: Option<BusMessage>,
    /// Requests answered with `HOLD_BUS`.
    pub held: Vec<BusMessage>,
    /// `C_WB`/`C_FLUSH` interventions supplied by snoopers.
    pub interventions: Vec<BusMessage>,
    /// Memory responses delivered.
    pub responses: Vec<BusMessage>,
    /// Accesses that finished this tick.
    pub completions: Vec<Completion>,
}

/// A complete coherence domain: agents, bus and memory.
pub struct System {
    agents: Vec<Controller>,
    arbiter: BusArbiter,
    memory: MemoryResponder,
    external: VecDeque<u64>,
    external_outstanding: Option<u64>,
    line_bytes: u64,
    check_invariants: bool,
    tick: u64,
    stats: CoherenceStats,
    trace: Option<TraceBuffer>,
    sinks: Vec<Box<dyn TraceSink>>,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("tick", &self.tick)
            .field("agents", &self.agents.len())
            .field("arbiter", &self.arbiter)
            .field("memory", &self.memory)
            .field("external", &self.external)
            .finish_non_exhaustive()
    }
}

impl System {
    /// Builds a system over zero-filled memory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(config, MemoryResponder::new(&config.memory)))
    }

    /// Builds a system over a caller-supplied backing store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` fails validation.
    pub fn with_store(config: &Config, store: Box<dyn BackingStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            config,
            MemoryResponder::with_store(&config.memory, store),
        ))
    }

    fn assemble(config: &Config, memory: MemoryResponder) -> Self {
        let protocol = Protocol::new(config.protocol);
        let agents: Vec<Controller> = (0..config.system.agents)
            .map(|i| Controller::new(AgentId::new(i as u16), &config.cache, protocol))
            .collect();
        let line_bytes = agents.first().map_or(64, |a| a.directory().line_bytes());

        Self {
            agents,
            arbiter: BusArbiter::new(),
            memory,
            external: VecDeque::new(),
            external_outstanding: None,
            line_bytes,
            check_invariants: config.general.check_invariants,
            tick: 0,
            stats: CoherenceStats::default(),
            trace: config.general.record_trace.then(TraceBuffer::new),
            sinks: Vec::new(),
        }
    }

    /// Number of agents.
    pub fn num_agents(&self) -> usize {
        self.agents.len()
    }

    /// Next tick to be executed.
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Line size shared by every agent.
    pub const fn line_bytes(&self) -> u64 {
        self.line_bytes
    }

    /// Controller of `agent`, if it exists.
    pub fn controller(&self, agent: AgentId) -> Option<&Controller> {
        self.agents.get(agent.index())
    }

    fn controller_mut(&mut self, agent: AgentId) -> Result<&mut Controller, CoherenceError> {
        self.agents
            .get_mut(agent.index())
            .ok_or(CoherenceError::UnknownAgent(agent))
    }

    /// State of the line containing `address` in `agent`'s directory.
    ///
    /// # Errors
    ///
    /// [`CoherenceError::UnknownAgent`] if `agent` does not exist.
    pub fn state(&self, agent: AgentId, address: u64) -> Result<CoherenceState, CoherenceError> {
        self.controller(agent)
            .map(|c| c.state_of(address))
            .ok_or(CoherenceError::UnknownAgent(agent))
    }

    /// The memory responder.
    pub const fn memory(&self) -> &MemoryResponder {
        &self.memory
    }

    /// Reads memory directly, bypassing the bus.
    pub fn peek(&self, address: u64) -> u64 {
        self.memory.peek(crate::common::line_base(address, self.line_bytes))
    }

    /// Counters collected so far.
    pub const fn stats(&self) -> &CoherenceStats {
        &self.stats
    }

    /// Events recorded when `general.record_trace` is on; empty otherwise.
    pub fn trace(&self) -> &[TraceEvent] {
        self.trace.as_ref().map(TraceBuffer::events).unwrap_or_default()
    }

    /// Removes and returns the recorded events.
    pub fn take_trace(&mut self) -> Vec<TraceEvent> {
        self.trace.as_mut().map(TraceBuffer::take).unwrap_or_default()
    }

    /// Registers an additional trace sink.
    pub fn add_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.sinks.push(sink);
    }

    /// Flushes every registered sink.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error reported by a sink.
    pub fn flush_sinks(&mut self) -> io::Result<()> {
        self.sinks.iter_mut().try_for_each(|s| s.flush())
    }

    /// Returns `true` when no request is pending anywhere in the system.
    pub fn is_quiescent(&self) -> bool {
        self.agents.iter().all(|a| a.pending_address().is_none())
            && self.external.is_empty()
            && self.external_outstanding.is_none()
            && self.memory.outstanding() == 0
    }

    fn emit(&mut self, event: TraceEvent) {
        if let Some(buffer) = self.trace.as_mut() {
            buffer.record(&event);
        }
        for sink in &mut self.sinks {
            sink.record(&event);
        }
    }

    fn record_changes(&mut self, changes: Vec<LineChange>) {
        for change in changes {
            let snooped = change.cause.is_some_and(|k| Event::from_snoop(k).is_some());
            if snooped && change.from.is_valid() && !change.to.is_valid() {
                self.stats.invalidations += 1;
            }
            self.emit(TraceEvent::transition(self.tick, &change));
        }
    }

    fn record_completion(&mut self, completion: Completion, report: &mut TickReport) {
        self.stats.completions += 1;
        self.emit(TraceEvent::completion(&completion));
        report.completions.push(completion);
    }

    /// Drains line changes and locally finished accesses from agent `index`.
    fn collect_agent(&mut self, index: usize, report: &mut TickReport) {
        let changes = self.agents[index].take_changes();
        self.record_changes(changes);
        for completion in self.agents[index].take_completions() {
            self.record_completion(completion, report);
        }
    }

    /// Issues a local load, store or flush on behalf of `agent`.
    ///
    /// # Returns
    ///
    /// `Hit` with the line payload if the access completed without the bus,
    /// otherwise `Pending`; the completion is then reported by a later
    /// [`System::tick`].
    ///
    /// # Errors
    ///
    /// * [`CoherenceError::UnknownAgent`] if `agent` does not exist.
    /// * [`CoherenceError::RequestAlreadyInFlight`] if the agent is busy.
    pub fn request(
        &mut self,
        agent: AgentId,
        address: u64,
        access: Access,
    ) -> Result<RequestOutcome, CoherenceError> {
        let tick = self.tick;
        let controller = self.controller_mut(agent)?;
        let outcome = controller.request(address, access)?;
        let line = controller.directory().align(address);
        let changes = controller.take_changes();
        self.record_changes(changes);

        match outcome {
            RequestOutcome::Hit(value) => {
                self.stats.hits += 1;
                self.stats.completions += 1;
                self.emit(TraceEvent::completion(&Completion {
                    agent,
                    address: line,
                    access,
                    value,
                    tick,
                }));
            }
            RequestOutcome::Pending => self.stats.misses += 1,
        }
        Ok(outcome)
    }

    /// Queues an external `REQ_FLUSH` for the line containing `address`.
    ///
    /// External flushes are issued one at a time, in order, with the lowest
    /// bus priority.
    pub fn request_flush(&mut self, address: u64) {
        self.external
            .push_back(crate::common::line_base(address, self.line_bytes));
    }

    fn submit(
        &mut self,
        agent: AgentId,
        message: BusMessage,
        report: &mut TickReport,
    ) -> Result<(), CoherenceError> {
        if self.arbiter.submit(agent, message)? == Submission::HoldBus {
            self.hold(message, report);
        }
        Ok(())
    }

    fn hold(&mut self, message: BusMessage, report: &mut TickReport) {
        if let Some(controller) = self.agents.get_mut(message.source().index()) {
            controller.held(message);
        }
        self.stats.holds += 1;
        self.stats.count(MessageKind::HoldBus);
        self.emit(TraceEvent::hold(self.tick, &message));
        report.held.push(message);
    }

    /// Advances the system by one tick.
    ///
    /// # Errors
    ///
    /// Any fatal [`CoherenceError`]: an illegal transition, or an invariant
    /// violation when `general.check_invariants` is on.
    pub fn tick(&mut self) -> Result<TickReport, CoherenceError> {
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        // Submit.
        let mut submitted = false;
        for index in 0..self.agents.len() {
            let request = self.agents[index].bus_request(tick)?;
            self.collect_agent(index, &mut report);
            if let Some(message) = request {
                submitted = true;
                self.submit(message.source(), message, &mut report)?;
            }
        }
        if self.external_outstanding.is_none()
            && let Some(&address) = self.external.front()
        {
            submitted = true;
            let message = BusMessage::new(MessageKind::ReqFlush, AgentId::EXTERNAL, address);
            self.submit(AgentId::EXTERNAL, message, &mut report)?;
        }

        // Arbitrate.
        let round = self.arbiter.arbitrate();
        for message in round.held {
            self.hold(message, &mut report);
        }
        match round.granted {
            Some(granted) => self.grant(granted, &mut report)?,
            None if !submitted => {
                self.stats.idle_ticks += 1;
                self.stats.count(MessageKind::NoReq);
                self.emit(TraceEvent::Idle { tick });
            }
            None => {}
        }

        // Respond.
        for response in self.memory.drain_ready(tick) {
            self.deliver(response, &mut report)?;
        }

        if self.check_invariants {
            self.check_invariants()?;
        }
        self.tick += 1;
        self.stats.ticks = self.tick;
        Ok(report)
    }

    /// Snoops the granted request and hands it to memory.
    fn grant(&mut self, granted: BusMessage, report: &mut TickReport) -> Result<(), CoherenceError> {
        let tick = self.tick;
        let source = granted.source();
        report.granted = Some(granted);
        self.stats.grants += 1;
        self.stats.count(granted.kind());
        if granted.kind().carries_data() {
            self.stats.writebacks += 1;
        }
        self.emit(TraceEvent::grant(tick, &granted));

        if source.is_external() {
            self.external_outstanding = self.external.pop_front();
        } else {
            self.controller_mut(source)?.granted(granted);
        }

        // Snoop.
        let mut shared = false;
        for index in 0..self.agents.len() {
            if self.agents[index].id() == source {
                continue;
            }
            let reply = self.agents[index].snoop(&granted)?;
            self.collect_agent(index, report);
            shared |= reply.shared;

            if let Some(intervention) = reply.intervention {
                self.stats.interventions += 1;
                self.stats.writebacks += 1;
                self.stats.count(intervention.kind());
                self.emit(TraceEvent::intervention(tick, &intervention));
                report.interventions.push(intervention);
                if let Some(ack) = self.memory.accept_intervention(&intervention) {
                    self.stats.count(ack.kind());
                    self.emit(TraceEvent::response(tick, &ack));
                }
            }
        }

        if self.memory.respond(&granted, shared, tick).is_none() {
            let _ = self.arbiter.release(granted.address());
        }
        Ok(())
    }

    /// Delivers one memory response to its requester.
    fn deliver(&mut self, response: BusMessage, report: &mut TickReport) -> Result<(), CoherenceError> {
        let tick = self.tick;
        let _ = self.arbiter.release(response.address());
        self.stats.count(response.kind());
        self.emit(TraceEvent::response(tick, &response));
        report.responses.push(response);

        let destination = response.source();
        if destination.is_external() {
            self.external_outstanding = None;
            let completion = Completion {
                agent: destination,
                address: response.address(),
                access: Access::Flush,
                value: 0,
                tick,
            };
            self.record_completion(completion, report);
            return Ok(());
        }

        let completion = self.controller_mut(destination)?.complete(&response, tick)?;
        self.collect_agent(destination.index(), report);
        if let Some(completion) = completion {
            self.record_completion(completion, report);
        }
        Ok(())
    }

    /// Checks the MESI invariants across every agent's directory.
    ///
    /// At most one agent holds a line `Exclusive` or `Modified`, and an owner
    /// excludes every other valid copy.
    ///
    /// # Errors
    ///
    /// [`CoherenceError::InvariantViolation`] naming the first offending line.
    pub fn check_invariants(&self) -> Result<(), CoherenceError> {
        let mut holders: BTreeMap<u64, Vec<(AgentId, CoherenceState)>> = BTreeMap::new();
        for agent in &self.agents {
            for entry in agent.directory().resident_lines() {
                holders
                    .entry(entry.address)
                    .or_default()
                    .push((agent.id(), entry.state));
            }
        }

        for (address, copies) in holders {
            let owners = copies.iter().filter(|(_, s)| s.is_owner()).count();
            if owners > 1 || (owners == 1 && copies.len() > 1) {
                let detail = copies
                    .iter()
                    .map(|(agent, state)| format!("{agent}={}", state.letter()))
                    .collect::<Vec<_>>()
                    .join(" ");
                return Err(CoherenceError::InvariantViolation { address, detail });
            }
        }
        Ok(())
    }
}
