//! Memory Responder.
//!
//! This module models main memory as seen from the coherence bus. It provides:
//! 1. **Store:** A [`BackingStore`] holding one payload per line.
//! 2. **Controller:** Latency modeling (simple or DRAM row-buffer) deciding
//!    when a response becomes deliverable.
//! 3. **Responder:** The mapping from granted requests to `MEM_RESP`,
//!    `MEM_RESP_S`, `MEM_C_RESP` and `EN_ACCESS` replies.
//!
//! Interventions (`C_WB`, `C_FLUSH`) are written to the store as soon as they
//! are snooped, so any fill generated afterwards for the same tick already
//! sees the written-back data.

/// Memory timing models.
pub mod controller;

/// Backing store trait and the default sparse memory.
pub mod store;

use std::collections::VecDeque;
use std::fmt;

use tracing::trace;

use self::controller::MemoryController;
use self::store::{BackingStore, SparseMemory};
use crate::config::MemoryConfig;
use crate::protocol::{BusMessage, MessageKind};

/// A reply waiting for its delivery tick.
///
/// The response message carries the requester's id as its `source`, which is
/// the agent it is delivered to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduledResponse {
    /// First tick at which the response may be delivered.
    pub ready_at: u64,
    /// The response itself.
    pub message: BusMessage,
}

/// Models the memory side of the bus.
pub struct MemoryResponder {
    store: Box<dyn BackingStore>,
    timing: Box<dyn MemoryController>,
    pending: VecDeque<ScheduledResponse>,
}

impl fmt::Debug for MemoryResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResponder")
            .field("timing", &self.timing)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl MemoryResponder {
    /// Creates a responder over a zeroed [`SparseMemory`].
    pub fn new(config: &MemoryConfig) -> Self {
        Self::with_store(config, Box::new(SparseMemory::new()))
    }

    /// Creates a responder over a caller-supplied store.
    pub fn with_store(config: &MemoryConfig, store: Box<dyn BackingStore>) -> Self {
        Self {
            store,
            timing: controller::build(config),
            pending: VecDeque::new(),
        }
    }

    /// Reads a line straight from the backing store, bypassing the bus.
    pub fn peek(&self, address: u64) -> u64 {
        self.store.get(address)
    }

    /// Number of responses not yet delivered.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Writes a snooper's intervention data back to the store.
    ///
    /// # Returns
    ///
    /// The `EN_ACCESS` acknowledgement addressed to the snooper, or `None` if
    /// `message` is not a `C_WB`/`C_FLUSH` with data.
    pub fn accept_intervention(&mut self, message: &BusMessage) -> Option<BusMessage> {
        if !matches!(message.kind(), MessageKind::CWb | MessageKind::CFlush) {
            return None;
        }
        let data = message.payload()?;
        self.store.put(message.address(), data);
        Some(BusMessage::new(
            MessageKind::EnAccess,
            message.source(),
            message.address(),
        ))
    }

    /// Handles the request granted this tick.
    ///
    /// # Arguments
    ///
    /// * `request` - The granted bus request.
    /// * `shared` - Whether any agent other than the requester still holds
    ///   the line after the snoop phase.
    /// * `tick` - Current tick.
    ///
    /// # Returns
    ///
    /// The scheduled reply, or `None` for kinds memory does not answer.
    pub fn respond(
        &mut self,
        request: &BusMessage,
        shared: bool,
        tick: u64,
    ) -> Option<ScheduledResponse> {
        let address = request.address();
        let requester = request.source();

        let message = match request.kind() {
            MessageKind::RReq => {
                let kind = if shared {
                    MessageKind::MemRespS
                } else {
                    MessageKind::MemResp
                };
                BusMessage::with_payload(kind, requester, address, self.store.get(address))
            }
            MessageKind::RfoBcast => BusMessage::with_payload(
                MessageKind::MemCResp,
                requester,
                address,
                self.store.get(address),
            ),
            MessageKind::WbReq | MessageKind::Flush => {
                if let Some(data) = request.payload() {
                    self.store.put(address, data);
                }
                BusMessage::new(MessageKind::EnAccess, requester, address)
            }
            MessageKind::WsBcast | MessageKind::FlushS | MessageKind::ReqFlush => {
                BusMessage::new(MessageKind::EnAccess, requester, address)
            }
            _ => return None,
        };

        let ready_at = tick.saturating_add(self.timing.access_latency(address));
        let scheduled = ScheduledResponse { ready_at, message };
        let pos = self.pending.partition_point(|r| r.ready_at <= ready_at);
        self.pending.insert(pos, scheduled);
        trace!(%message, ready_at, "memory response scheduled");
        Some(scheduled)
    }

    /// Removes and returns every response deliverable at `tick`, oldest first.
    pub fn drain_ready(&mut self, tick: u64) -> Vec<BusMessage> {
        let due = self.pending.partition_point(|r| r.ready_at <= tick);
        self.pending.drain(..due).map(|r| r.message).collect()
    }
}
