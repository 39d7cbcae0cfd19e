//! Access requests issued by agents and the ways they complete.
//!
//! Every line carries a single `u64` payload. Reads return the payload and
//! writes replace it, which is enough to observe whether dirty data was
//! written back before a peer's fill.

use serde::Serialize;

use super::addr::AgentId;

/// A local request issued to an agent's coherence controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum Access {
    /// Load the line payload.
    Read,
    /// Store a new line payload.
    Write(u64),
    /// Write back (if dirty) and invalidate the line.
    Flush,
}

impl Access {
    /// Returns `true` if the access needs write permission.
    #[inline]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write(_))
    }
}

/// Immediate result of [`crate::soc::System::request`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The access hit and completed locally; carries the line payload after the access.
    Hit(u64),
    /// The access needs the bus; a [`Completion`] is reported by a later tick.
    Pending,
}

/// A finished access, reported by the tick that completed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Completion {
    /// Agent that issued the access.
    pub agent: AgentId,
    /// Line address of the access.
    pub address: u64,
    /// The access that finished.
    pub access: Access,
    /// Line payload observed (reads) or stored (writes). Zero for flushes.
    pub value: u64,
    /// Tick at which the access finished.
    pub tick: u64,
}
