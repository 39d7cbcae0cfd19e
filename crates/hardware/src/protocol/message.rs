//! Bus Message Catalog.
//!
//! The bus carries exactly fifteen kinds of message, each with a fixed 4-bit
//! encoding. Encodings are kept so traces and raw message construction can be
//! checked against the catalog; the model itself only ever matches on the enum.
//!
//! # Roles
//!
//! - `NO_REQ`: idle bus slot.
//! - `R_REQ`, `RFO_BCAST`, `WS_BCAST`: misses and upgrades.
//! - `WB_REQ`, `FLUSH`, `FLUSH_S`, `REQ_FLUSH`: writebacks and flushes.
//! - `C_WB`, `C_FLUSH`: interventions by a snooping owner of dirty data.
//! - `EN_ACCESS`, `MEM_RESP`, `MEM_RESP_S`, `MEM_C_RESP`: memory responses.
//! - `HOLD_BUS`: arbitration deferral.

use std::fmt;

use serde::Serialize;

use crate::common::{AgentId, CoherenceError};

/// Kind of a bus message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MessageKind {
    /// No request this bus cycle.
    NoReq = 0,
    /// Read miss.
    RReq = 1,
    /// Capacity eviction of a dirty line.
    WbReq = 2,
    /// Explicit flush of a dirty line by its owner.
    Flush = 3,
    /// Explicit flush of a clean line by its holder.
    FlushS = 4,
    /// Write-to-shared upgrade broadcast.
    WsBcast = 5,
    /// Request for ownership.
    RfoBcast = 6,
    /// Coherence writeback by a snooping owner.
    CWb = 7,
    /// Coherence flush by a snooping owner on an external flush.
    CFlush = 8,
    /// Memory acknowledgement enabling the requester to proceed.
    EnAccess = 9,
    /// Exclusive fill.
    MemResp = 10,
    /// Shared fill.
    MemRespS = 11,
    /// Ownership fill.
    MemCResp = 12,
    /// External flush request.
    ReqFlush = 13,
    /// Arbitration deferral.
    HoldBus = 14,
}

/// Coarse grouping of message kinds by who sends them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageClass {
    /// Bus bookkeeping (`NO_REQ`, `HOLD_BUS`).
    Control,
    /// Arbitrated requests from agents or the external port.
    Request,
    /// Data supplied by a snooper during another agent's transaction.
    Intervention,
    /// Replies from the memory responder.
    Response,
}

impl MessageKind {
    /// Number of kinds in the catalog.
    pub const COUNT: usize = 15;

    /// Every kind, in encoding order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::NoReq,
        Self::RReq,
        Self::WbReq,
        Self::Flush,
        Self::FlushS,
        Self::WsBcast,
        Self::RfoBcast,
        Self::CWb,
        Self::CFlush,
        Self::EnAccess,
        Self::MemResp,
        Self::MemRespS,
        Self::MemCResp,
        Self::ReqFlush,
        Self::HoldBus,
    ];

    /// Returns the 4-bit encoding.
    #[inline]
    pub const fn encoding(self) -> u8 {
        self as u8
    }

    /// Returns the catalog mnemonic, e.g. `"RFO_BCAST"`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoReq => "NO_REQ",
            Self::RReq => "R_REQ",
            Self::WbReq => "WB_REQ",
            Self::Flush => "FLUSH",
            Self::FlushS => "FLUSH_S",
            Self::WsBcast => "WS_BCAST",
            Self::RfoBcast => "RFO_BCAST",
            Self::CWb => "C_WB",
            Self::CFlush => "C_FLUSH",
            Self::EnAccess => "EN_ACCESS",
            Self::MemResp => "MEM_RESP",
            Self::MemRespS => "MEM_RESP_S",
            Self::MemCResp => "MEM_C_RESP",
            Self::ReqFlush => "REQ_FLUSH",
            Self::HoldBus => "HOLD_BUS",
        }
    }

    /// Returns the class of this kind.
    pub const fn class(self) -> MessageClass {
        match self {
            Self::NoReq | Self::HoldBus => MessageClass::Control,
            Self::RReq
            | Self::WbReq
            | Self::Flush
            | Self::FlushS
            | Self::WsBcast
            | Self::RfoBcast
            | Self::ReqFlush => MessageClass::Request,
            Self::CWb | Self::CFlush => MessageClass::Intervention,
            Self::EnAccess | Self::MemResp | Self::MemRespS | Self::MemCResp => {
                MessageClass::Response
            }
        }
    }

    /// Returns `true` if a message of this kind carries line data.
    pub const fn carries_data(self) -> bool {
        matches!(
            self,
            Self::WbReq
                | Self::Flush
                | Self::CWb
                | Self::CFlush
                | Self::MemResp
                | Self::MemRespS
                | Self::MemCResp
        )
    }

    /// Returns `true` for broadcasts that strip every other copy of the line.
    pub const fn invalidates_peers(self) -> bool {
        matches!(self, Self::RfoBcast | Self::WsBcast | Self::ReqFlush)
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = CoherenceError;

    fn try_from(encoding: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(encoding as usize)
            .copied()
            .ok_or(CoherenceError::InvalidMessageKind(encoding))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A message on the bus.
///
/// Fields are private: once built, a message is never modified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BusMessage {
    kind: MessageKind,
    source: AgentId,
    address: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<u64>,
}

impl BusMessage {
    /// Creates a message without payload.
    pub const fn new(kind: MessageKind, source: AgentId, address: u64) -> Self {
        Self {
            kind,
            source,
            address,
            payload: None,
        }
    }

    /// Creates a message carrying line data.
    pub const fn with_payload(kind: MessageKind, source: AgentId, address: u64, data: u64) -> Self {
        Self {
            kind,
            source,
            address,
            payload: Some(data),
        }
    }

    /// Creates a message from a raw 4-bit kind encoding.
    ///
    /// # Errors
    ///
    /// Returns [`CoherenceError::InvalidMessageKind`] if `encoding` is not in the catalog.
    pub fn from_raw(
        encoding: u8,
        source: AgentId,
        address: u64,
        payload: Option<u64>,
    ) -> Result<Self, CoherenceError> {
        let kind = MessageKind::try_from(encoding)?;
        Ok(Self {
            kind,
            source,
            address,
            payload,
        })
    }

    /// Kind of the message.
    #[inline]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Requester that put the message on the bus.
    #[inline]
    pub const fn source(&self) -> AgentId {
        self.source
    }

    /// Line address the message refers to.
    #[inline]
    pub const fn address(&self) -> u64 {
        self.address
    }

    /// Line data carried by the message, if any.
    #[inline]
    pub const fn payload(&self) -> Option<u64> {
        self.payload
    }
}

impl fmt::Display for BusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:#x}", self.kind, self.source, self.address)?;
        if let Some(data) = self.payload {
            write!(f, " [{data:#x}]")?;
        }
        Ok(())
    }
}
