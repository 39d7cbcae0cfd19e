//! Per-Agent Line Directory.
//!
//! This module implements the set-associative directory each agent keeps of
//! the lines in its private cache. It provides:
//! 1. **Lookup:** Address to MESI state, `Invalid` when the line is absent.
//! 2. **Install and eviction:** Fills land in a free way or displace the
//!    replacement policy's victim; [`LineDirectory::victim_for`] previews the
//!    victim so a dirty one can be written back before the fill arrives.
//! 3. **Invalidation:** Idempotent removal of a line.
//! 4. **Writeback:** A `C_WB` message carrying the data of a dirty line.
//!
//! A directory is owned by exactly one controller and never shared.

/// Replacement policy implementations (FIFO, LRU, MRU, PLRU, Random).
pub mod policies;

use std::fmt;

use serde::Serialize;
use tracing::warn;

use self::policies::ReplacementPolicy;
use crate::common::{AgentId, line_base};
use crate::config::CacheConfig;
use crate::protocol::{BusMessage, CoherenceState, MessageKind};

/// One resident line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LineEntry {
    /// Line-aligned address.
    pub address: u64,
    /// Current MESI state; never `Invalid` while resident.
    pub state: CoherenceState,
    /// Line payload.
    pub data: u64,
}

impl LineEntry {
    /// Returns `true` if the line must be written back before it is dropped.
    #[inline]
    pub const fn dirty(&self) -> bool {
        self.state.is_dirty()
    }
}

/// Set-associative address to [`LineEntry`] map with a replacement policy.
pub struct LineDirectory {
    slots: Vec<Option<LineEntry>>,
    num_sets: usize,
    ways: usize,
    line_bytes: u64,
    policy: Box<dyn ReplacementPolicy>,
}

impl fmt::Debug for LineDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineDirectory")
            .field("num_sets", &self.num_sets)
            .field("ways", &self.ways)
            .field("line_bytes", &self.line_bytes)
            .field("resident", &self.len())
            .finish_non_exhaustive()
    }
}

impl LineDirectory {
    /// Creates an empty directory with the configured geometry.
    ///
    /// Zero-valued geometry fields fall back to one way, 64-byte lines and
    /// one set, so a directory always has at least one slot.
    pub fn new(config: &CacheConfig) -> Self {
        let ways = if config.ways == 0 {
            warn!("cache associativity is zero, using one way");
            1
        } else {
            config.ways
        };
        let line_bytes = if config.line_bytes.is_power_of_two() {
            config.line_bytes
        } else {
            warn!(line_bytes = config.line_bytes, "line size is not a power of two, using 64");
            64
        };
        let mut num_sets = config.size_bytes / line_bytes / ways;
        if num_sets == 0 {
            warn!(
                size_bytes = config.size_bytes,
                ways,
                line_bytes,
                "cache capacity holds no full set, using one set"
            );
            num_sets = 1;
        }

        Self {
            slots: vec![None; num_sets * ways],
            num_sets,
            ways,
            line_bytes: line_bytes as u64,
            policy: policies::build(config.policy, num_sets, ways),
        }
    }

    /// Line size in bytes.
    #[inline]
    pub const fn line_bytes(&self) -> u64 {
        self.line_bytes
    }

    /// Total number of lines the directory can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.num_sets * self.ways
    }

    /// Number of resident lines.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Returns `true` if no line is resident.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Aligns `addr` to this directory's line size.
    #[inline]
    pub const fn align(&self, addr: u64) -> u64 {
        line_base(addr, self.line_bytes)
    }

    #[inline]
    const fn set_of(&self, line: u64) -> usize {
        ((line / self.line_bytes) % self.num_sets as u64) as usize
    }

    /// Returns `(set, way)` of a resident line.
    fn find(&self, addr: u64) -> Option<(usize, usize)> {
        let line = self.align(addr);
        let set = self.set_of(line);
        let base = set * self.ways;
        (0..self.ways)
            .find(|&way| matches!(self.slots[base + way], Some(e) if e.address == line))
            .map(|way| (set, way))
    }

    /// Returns the state of the line containing `addr`; `Invalid` if absent.
    pub fn lookup(&self, addr: u64) -> CoherenceState {
        self.entry(addr).map_or(CoherenceState::Invalid, |e| e.state)
    }

    /// Returns the resident entry for `addr`, if any.
    pub fn entry(&self, addr: u64) -> Option<&LineEntry> {
        self.find(addr)
            .and_then(|(set, way)| self.slots[set * self.ways + way].as_ref())
    }

    /// Returns the entry for a hit and records the access with the replacement policy.
    pub fn hit(&mut self, addr: u64) -> Option<&mut LineEntry> {
        let (set, way) = self.find(addr)?;
        self.policy.accessed(set, way);
        self.slots[set * self.ways + way].as_mut()
    }

    /// Installs or updates a line.
    ///
    /// If the line is resident its state and data are replaced. Otherwise it
    /// takes a free way of its set, or displaces the policy's victim.
    ///
    /// # Returns
    ///
    /// The displaced entry, if a resident line had to make room. The caller
    /// is responsible for having written it back if it was dirty.
    pub fn install(&mut self, addr: u64, state: CoherenceState, data: u64) -> Option<LineEntry> {
        let line = self.align(addr);
        if !state.is_valid() {
            let _ = self.invalidate(line);
            return None;
        }
        if let Some(entry) = self.hit(line) {
            entry.state = state;
            entry.data = data;
            return None;
        }

        let set = self.set_of(line);
        let base = set * self.ways;
        let way = (0..self.ways)
            .find(|&w| self.slots[base + w].is_none())
            .unwrap_or_else(|| self.policy.victim(set));

        let displaced = self.slots[base + way].replace(LineEntry {
            address: line,
            state,
            data,
        });
        self.policy.inserted(set, way);
        displaced
    }

    /// Changes the state of a resident line; `Invalid` removes it.
    ///
    /// # Returns
    ///
    /// `false` if the line was not resident.
    pub fn set_state(&mut self, addr: u64, state: CoherenceState) -> bool {
        if !state.is_valid() {
            return self.invalidate(addr).is_some();
        }
        match self.find(addr) {
            Some((set, way)) => {
                if let Some(entry) = self.slots[set * self.ways + way].as_mut() {
                    entry.state = state;
                }
                true
            }
            None => false,
        }
    }

    /// Removes the line containing `addr`.
    ///
    /// Invalidating a line that is not resident is a no-op.
    ///
    /// # Returns
    ///
    /// The removed entry, if the line was resident.
    pub fn invalidate(&mut self, addr: u64) -> Option<LineEntry> {
        let (set, way) = self.find(addr)?;
        self.slots[set * self.ways + way].take()
    }

    /// Builds the `C_WB` message for a dirty line.
    ///
    /// The line's state is left unchanged; the caller applies the transition.
    pub fn writeback_if_dirty(&self, addr: u64, agent: AgentId) -> Option<BusMessage> {
        self.entry(addr)
            .filter(|e| e.dirty())
            .map(|e| BusMessage::with_payload(MessageKind::CWb, agent, e.address, e.data))
    }

    /// Returns the entry a fill of `addr` would displace.
    ///
    /// `None` when the line is already resident or its set has a free way.
    pub fn victim_for(&self, addr: u64) -> Option<LineEntry> {
        let line = self.align(addr);
        if self.find(line).is_some() {
            return None;
        }
        let set = self.set_of(line);
        let base = set * self.ways;
        if (0..self.ways).any(|w| self.slots[base + w].is_none()) {
            return None;
        }
        self.slots[base + self.policy.victim(set)]
    }

    /// Iterates over every resident line.
    pub fn resident_lines(&self) -> impl Iterator<Item = &LineEntry> + '_ {
        self.slots.iter().flatten()
    }
}
