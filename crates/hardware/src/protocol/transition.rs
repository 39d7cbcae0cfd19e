//! Coherence Transition Table.
//!
//! `Protocol::transition` is the single source of truth for what a line does
//! on every event. Controllers never change a line's state without asking it.
//!
//! For a local miss the returned `next` state is the state the line will have
//! once the fill arrives; the line itself stays put until then.
//!
//! Policy knobs (see [`ProtocolConfig`]):
//! - whether an owner snooping a peer's read drops to `Invalid` (MESI, the
//!   default) or keeps a `Shared` copy;
//! - whether a read fill with no other holder lands in `Exclusive`;
//! - whether a `Shared` holder upgrades with `WS_BCAST` instead of `RFO_BCAST`.

use std::fmt;

use serde::Serialize;

use super::message::MessageKind;
use super::state::CoherenceState;
use crate::common::error::IllegalTransition;
use crate::config::{PeerReadPolicy, ProtocolConfig};

/// Something that can happen to a line in one agent's cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Event {
    /// The owning agent loads from the line.
    LocalRead,
    /// The owning agent stores to the line.
    LocalWrite,
    /// The owning agent explicitly flushes the line.
    LocalFlush,
    /// The line is chosen as a capacity victim.
    Evict,
    /// A peer's `R_REQ` was snooped.
    SnoopRead,
    /// A peer's `RFO_BCAST` or `WS_BCAST` was snooped.
    SnoopOwnership,
    /// An external `REQ_FLUSH` was snooped.
    SnoopFlush,
    /// A memory response for this agent's own request arrived.
    Response(MessageKind),
}

impl Event {
    /// Maps a granted bus request to the event it causes in a snooping peer.
    ///
    /// Returns `None` for kinds peers ignore (writebacks and flushes of lines
    /// only the requester can hold, control and response kinds).
    pub const fn from_snoop(kind: MessageKind) -> Option<Self> {
        match kind {
            MessageKind::RReq => Some(Self::SnoopRead),
            MessageKind::ReqFlush => Some(Self::SnoopFlush),
            k if k.invalidates_peers() => Some(Self::SnoopOwnership),
            _ => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalRead => f.write_str("local read"),
            Self::LocalWrite => f.write_str("local write"),
            Self::LocalFlush => f.write_str("local flush"),
            Self::Evict => f.write_str("eviction"),
            Self::SnoopRead => f.write_str("snooped R_REQ"),
            Self::SnoopOwnership => f.write_str("snooped ownership broadcast"),
            Self::SnoopFlush => f.write_str("snooped REQ_FLUSH"),
            Self::Response(kind) => write!(f, "response {kind}"),
        }
    }
}

/// One row of the transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    /// State after the event (after the fill, for misses).
    pub next: CoherenceState,
    /// Bus message the event makes this agent send, if any.
    pub emit: Option<MessageKind>,
}

impl Transition {
    const fn to(next: CoherenceState) -> Self {
        Self { next, emit: None }
    }

    const fn emit(next: CoherenceState, kind: MessageKind) -> Self {
        Self {
            next,
            emit: Some(kind),
        }
    }

    /// Returns `true` if the event completes without touching the bus.
    #[inline]
    pub const fn is_silent(&self) -> bool {
        self.emit.is_none()
    }
}

/// The MESI transition table under a given policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Protocol {
    policy: ProtocolConfig,
}

impl Protocol {
    /// Creates the table for the given policy.
    pub const fn new(policy: ProtocolConfig) -> Self {
        Self { policy }
    }

    /// Policy this table was built with.
    pub const fn policy(&self) -> &ProtocolConfig {
        &self.policy
    }

    const fn read_downgrade(&self) -> CoherenceState {
        match self.policy.peer_read_downgrade {
            PeerReadPolicy::Invalid => CoherenceState::Invalid,
            PeerReadPolicy::Shared => CoherenceState::Shared,
        }
    }

    /// Looks up the row for `(state, event)`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] when no row matches, e.g. evicting a line
    /// that is not resident or receiving a fill for a line already owned.
    pub const fn transition(
        &self,
        state: CoherenceState,
        event: Event,
    ) -> Result<Transition, IllegalTransition> {
        use CoherenceState::{Exclusive as E, Invalid as I, Modified as M, Shared as S};
        use Event::{
            Evict, LocalFlush, LocalRead, LocalWrite, Response, SnoopFlush, SnoopOwnership,
            SnoopRead,
        };

        let row = match (state, event) {
            (I, LocalRead) => Transition::emit(S, MessageKind::RReq),
            (I, LocalWrite) => Transition::emit(M, MessageKind::RfoBcast),
            (S, LocalWrite) => {
                if self.policy.shared_write_upgrade {
                    Transition::emit(M, MessageKind::WsBcast)
                } else {
                    Transition::emit(M, MessageKind::RfoBcast)
                }
            }
            (E, LocalWrite) | (M, LocalRead | LocalWrite) => Transition::to(M),
            (S, LocalRead) => Transition::to(S),
            (E, LocalRead) => Transition::to(E),

            (M, LocalFlush) => Transition::emit(I, MessageKind::Flush),
            (S | E, LocalFlush) => Transition::emit(I, MessageKind::FlushS),
            (I, LocalFlush) => Transition::to(I),

            (M, Evict) => Transition::emit(I, MessageKind::WbReq),
            (S | E, Evict) => Transition::to(I),

            (I, SnoopRead | SnoopOwnership | SnoopFlush) => Transition::to(I),
            (M, SnoopRead) => Transition::emit(self.read_downgrade(), MessageKind::CWb),
            (E, SnoopRead) => Transition::to(self.read_downgrade()),
            (S, SnoopRead) => Transition::to(S),
            (M, SnoopOwnership) => Transition::emit(I, MessageKind::CWb),
            (S | E, SnoopOwnership | SnoopFlush) => Transition::to(I),
            (M, SnoopFlush) => Transition::emit(I, MessageKind::CFlush),

            (I, Response(MessageKind::MemResp)) => {
                if self.policy.exclusive_fill {
                    Transition::to(E)
                } else {
                    Transition::to(S)
                }
            }
            (I, Response(MessageKind::MemRespS)) => Transition::to(S),
            (I | S, Response(MessageKind::MemCResp)) | (S, Response(MessageKind::EnAccess)) => {
                Transition::to(M)
            }

            _ => return Err(IllegalTransition { state, event }),
        };
        Ok(row)
    }
}
