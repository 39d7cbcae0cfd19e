//! Agent identifiers and line addresses.
//!
//! Agents are numbered densely from zero. The numeric order is also the fixed
//! arbitration priority: the lowest identifier wins the bus. A reserved
//! identifier names the external flush port, which sorts after every agent.

use std::fmt;

use serde::Serialize;

/// Identifier of a bus requester.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AgentId(pub u16);

impl AgentId {
    /// Requester id used by the external flush port (`REQ_FLUSH`).
    ///
    /// It is the largest representable id so it always loses ties against
    /// real agents.
    pub const EXTERNAL: Self = Self(u16::MAX);

    /// Creates an agent id from a dense index.
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the dense index of this agent, suitable for indexing agent tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` for the external flush port.
    #[inline]
    pub const fn is_external(self) -> bool {
        self.0 == u16::MAX
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_external() {
            write!(f, "ext")
        } else {
            write!(f, "a{}", self.0)
        }
    }
}

/// Aligns `addr` down to the start of its cache line.
///
/// # Arguments
///
/// * `addr` - Any byte address.
/// * `line_bytes` - Line size in bytes; must be a non-zero power of two.
///
/// # Returns
///
/// The address of the first byte of the line containing `addr`.
#[inline]
pub const fn line_base(addr: u64, line_bytes: u64) -> u64 {
    addr & !(line_bytes - 1)
}
