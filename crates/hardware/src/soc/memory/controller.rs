//! Memory timing models.
//!
//! This module provides:
//! 1. **SimpleController:** Fixed latency per access (no row-buffer modeling).
//! 2. **DramController:** Row-buffer-aware latency (CAS, RAS, precharge) for DRAM-style timing.
//!
//! Latencies are in bus ticks. A latency of zero means the response is
//! delivered in the same tick the request was granted.

use std::fmt;

use crate::config::{MemoryConfig, MemoryController as ControllerType};

/// Trait for memory timing models that report access latency in ticks.
pub trait MemoryController: Send + Sync + fmt::Debug {
    /// Returns the number of ticks required for an access to the given line.
    ///
    /// # Arguments
    ///
    /// * `addr` - Line address being accessed (used for row-buffer modeling).
    fn access_latency(&mut self, addr: u64) -> u64;
}

/// Fixed-latency controller; every access takes the same number of ticks.
#[derive(Debug, Clone)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// Creates a simple controller with the given fixed latency in ticks.
    pub const fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl MemoryController for SimpleController {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.latency
    }
}

/// DRAM-style controller with one open row; models CAS, RAS, and precharge latencies.
#[derive(Debug, Clone)]
pub struct DramController {
    open_row: Option<u64>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
    row_mask: u64,
}

impl DramController {
    /// Creates a DRAM controller with the given timing parameters (in ticks).
    ///
    /// # Arguments
    ///
    /// * `t_cas` - Column access strobe latency.
    /// * `t_ras` - Row access strobe latency.
    /// * `t_pre` - Precharge latency.
    /// * `row_bytes` - Row size in bytes; a power of two.
    pub const fn new(t_cas: u64, t_ras: u64, t_pre: u64, row_bytes: u64) -> Self {
        Self {
            open_row: None,
            t_cas,
            t_ras,
            t_pre,
            row_mask: !(row_bytes.saturating_sub(1)),
        }
    }
}

impl MemoryController for DramController {
    fn access_latency(&mut self, addr: u64) -> u64 {
        let row = addr & self.row_mask;
        match self.open_row.replace(row) {
            Some(open) if open == row => self.t_cas,
            Some(_) => self.t_pre.saturating_add(self.t_ras).saturating_add(self.t_cas),
            None => self.t_ras.saturating_add(self.t_cas),
        }
    }
}

/// Builds the configured timing model.
pub fn build(config: &MemoryConfig) -> Box<dyn MemoryController> {
    match config.controller {
        ControllerType::Simple => Box::new(SimpleController::new(config.latency)),
        ControllerType::Dram => Box::new(DramController::new(
            config.t_cas,
            config.t_ras,
            config.t_pre,
            config.row_bytes,
        )),
    }
}
