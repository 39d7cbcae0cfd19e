//! Configuration system for the coherence simulator.
//!
//! This module defines all configuration structures and enums used to parameterize
//! the simulator. It provides:
//! 1. **Defaults:** Baseline constants (agent count, cache geometry, memory timing).
//! 2. **Structures:** Hierarchical config for general, system, cache, memory and protocol.
//! 3. **Enums:** Memory controller, replacement policy and peer-read downgrade policy.
//!
//! Configuration is supplied as JSON (`Config::from_json`, `Config::from_json_file`)
//! or built with `Config::default()`. Every field has a default, so a JSON file
//! only needs the values it changes.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::ConfigError;

/// Default configuration constants for the simulator.
mod defaults {
    /// Number of agents (private caches) on the bus.
    pub const AGENTS: usize = 2;

    /// Upper bound on ticks for a single `run` before the driver gives up.
    pub const MAX_TICKS: u64 = 1_000_000;

    /// Default per-agent cache size in bytes (32 KiB).
    pub const CACHE_SIZE: usize = 32 * 1024;

    /// Default cache line size in bytes (64 bytes).
    ///
    /// Addresses are aligned down to this size before any lookup.
    pub const CACHE_LINE: usize = 64;

    /// Default cache associativity.
    pub const CACHE_WAYS: usize = 4;

    /// Fixed memory response latency in ticks (0 = respond in the grant tick).
    pub const MEMORY_LATENCY: u64 = 0;

    /// CAS (Column Access Strobe) latency in ticks.
    pub const T_CAS: u64 = 2;

    /// RAS (Row Access Strobe) latency in ticks.
    pub const T_RAS: u64 = 2;

    /// Precharge latency in ticks.
    pub const T_PRE: u64 = 2;

    /// Size of one DRAM row in bytes; must be a power of two.
    pub const ROW_BYTES: u64 = 2048;

    /// Largest number of lines one agent's directory may hold (16 Mi lines).
    pub const MAX_LINES: usize = 1 << 24;

    /// Largest latency accepted for any single memory timing parameter.
    pub const MAX_LATENCY: u64 = 1 << 32;
}

/// Memory controller timing models.
///
/// Selects how many ticks the memory responder takes to answer a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryController {
    /// Every response takes `memory.latency` ticks.
    #[default]
    Simple,
    /// Row-buffer model: hits cost tCAS, misses add tRAS and tPRE.
    #[serde(alias = "DRAM")]
    Dram,
}

/// Line directory replacement policy algorithms.
///
/// Specifies the algorithm used to select which line to evict
/// when a fill lands in a full set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Least Recently Used.
    #[default]
    #[serde(alias = "Lru")]
    Lru,
    /// Tree Pseudo-LRU.
    #[serde(alias = "Plru")]
    Plru,
    /// First In First Out.
    #[serde(alias = "Fifo")]
    Fifo,
    /// Pseudo-random (xorshift).
    #[serde(alias = "Random")]
    Random,
    /// Most Recently Used.
    #[serde(alias = "Mru")]
    Mru,
}

/// What an `Exclusive` or `Modified` holder keeps after snooping a peer's read miss.
///
/// Without an `Owned` state both choices are valid: MESI forces the owner
/// out so the reader refills from memory; keeping `Shared` saves the refill
/// for the previous owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PeerReadPolicy {
    /// Drop to `Invalid` (writing back first if dirty).
    #[default]
    Invalid,
    /// Keep a `Shared` copy (writing back first if dirty).
    Shared,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use cohsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.system.agents, 2);
/// assert_eq!(config.cache.line_bytes, 64);
/// assert!(config.general.check_invariants);
/// ```
///
/// Deserializing from JSON; omitted fields keep their defaults:
///
/// ```
/// use cohsim_core::config::{Config, MemoryController, PeerReadPolicy, ReplacementPolicy};
///
/// let json = r#"{
///     "system": { "agents": 4 },
///     "cache": { "size_bytes": 1024, "ways": 2, "policy": "Fifo" },
///     "memory": { "controller": "Dram", "t_cas": 3 },
///     "protocol": { "peer_read_downgrade": "Shared", "exclusive_fill": true }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.system.agents, 4);
/// assert_eq!(config.cache.policy, ReplacementPolicy::Fifo);
/// assert_eq!(config.cache.line_bytes, 64);
/// assert_eq!(config.memory.controller, MemoryController::Dram);
/// assert_eq!(config.protocol.peer_read_downgrade, PeerReadPolicy::Shared);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General simulation settings
    pub general: GeneralConfig,
    /// Agent count
    pub system: SystemConfig,
    /// Per-agent line directory geometry
    pub cache: CacheConfig,
    /// Memory responder timing
    pub memory: MemoryConfig,
    /// Protocol policy
    pub protocol: ProtocolConfig,
}

impl Config {
    /// Parses and validates a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed JSON and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Config::from_json`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks that the configuration describes a system the model can run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: String| Err(ConfigError::Invalid { field, reason });

        if self.system.agents == 0 {
            return invalid("system.agents", "at least one agent is required".into());
        }
        if self.system.agents >= usize::from(u16::MAX) {
            return invalid(
                "system.agents",
                format!("{} exceeds the agent id space", self.system.agents),
            );
        }
        if !self.cache.line_bytes.is_power_of_two() {
            return invalid(
                "cache.line_bytes",
                format!("{} is not a non-zero power of two", self.cache.line_bytes),
            );
        }
        if self.cache.ways == 0 {
            return invalid("cache.ways", "associativity must be at least 1".into());
        }
        let Some(set_bytes) = self.cache.line_bytes.checked_mul(self.cache.ways) else {
            return invalid(
                "cache.ways",
                format!(
                    "{} ways of {} bytes overflow the address space",
                    self.cache.ways, self.cache.line_bytes
                ),
            );
        };
        if self.cache.size_bytes < set_bytes {
            return invalid(
                "cache.size_bytes",
                format!(
                    "{} bytes cannot hold one set of {} x {} bytes",
                    self.cache.size_bytes, self.cache.ways, self.cache.line_bytes
                ),
            );
        }
        if self.cache.size_bytes / self.cache.line_bytes > defaults::MAX_LINES {
            return invalid(
                "cache.size_bytes",
                format!(
                    "{} bytes exceeds {} lines per agent",
                    self.cache.size_bytes,
                    defaults::MAX_LINES
                ),
            );
        }
        let timings = [
            ("memory.latency", self.memory.latency),
            ("memory.t_cas", self.memory.t_cas),
            ("memory.t_ras", self.memory.t_ras),
            ("memory.t_pre", self.memory.t_pre),
        ];
        if let Some((field, ticks)) = timings
            .into_iter()
            .find(|(_, ticks)| *ticks > defaults::MAX_LATENCY)
        {
            return invalid(
                field,
                format!("{ticks} ticks exceeds the limit of {}", defaults::MAX_LATENCY),
            );
        }
        if !self.memory.row_bytes.is_power_of_two() {
            return invalid(
                "memory.row_bytes",
                format!("{} is not a non-zero power of two", self.memory.row_bytes),
            );
        }
        Ok(())
    }
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Check the single-writer/multiple-reader invariant after every tick.
    #[serde(default = "GeneralConfig::default_check_invariants")]
    pub check_invariants: bool,

    /// Keep every trace event in memory (see [`crate::trace::TraceBuffer`]).
    #[serde(default)]
    pub record_trace: bool,

    /// Tick budget for `Simulator::run`.
    #[serde(default = "GeneralConfig::default_max_ticks")]
    pub max_ticks: u64,
}

impl GeneralConfig {
    /// Invariant checking is on unless explicitly disabled.
    const fn default_check_invariants() -> bool {
        true
    }

    /// Returns the default tick budget.
    const fn default_max_ticks() -> u64 {
        defaults::MAX_TICKS
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            check_invariants: true,
            record_trace: false,
            max_ticks: defaults::MAX_TICKS,
        }
    }
}

/// System shape.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Number of agents on the bus; ids are `0..agents`.
    #[serde(default = "SystemConfig::default_agents")]
    pub agents: usize,
}

impl SystemConfig {
    /// Returns the default agent count.
    const fn default_agents() -> usize {
        defaults::AGENTS
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            agents: defaults::AGENTS,
        }
    }
}

/// Geometry and replacement policy of each agent's line directory.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Total capacity in bytes
    #[serde(default = "CacheConfig::default_size")]
    pub size_bytes: usize,
    /// Line size in bytes
    #[serde(default = "CacheConfig::default_line")]
    pub line_bytes: usize,
    /// Associativity
    #[serde(default = "CacheConfig::default_ways")]
    pub ways: usize,
    /// Victim selection policy
    #[serde(default)]
    pub policy: ReplacementPolicy,
}

impl CacheConfig {
    /// Returns the default capacity.
    const fn default_size() -> usize {
        defaults::CACHE_SIZE
    }

    /// Returns the default line size.
    const fn default_line() -> usize {
        defaults::CACHE_LINE
    }

    /// Returns the default associativity.
    const fn default_ways() -> usize {
        defaults::CACHE_WAYS
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::CACHE_SIZE,
            line_bytes: defaults::CACHE_LINE,
            ways: defaults::CACHE_WAYS,
            policy: ReplacementPolicy::default(),
        }
    }
}

/// Memory responder timing.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Timing model
    #[serde(default)]
    pub controller: MemoryController,

    /// Fixed latency in ticks (`Simple` controller)
    #[serde(default = "MemoryConfig::default_latency")]
    pub latency: u64,

    /// CAS latency (column access strobe)
    #[serde(default = "MemoryConfig::default_t_cas")]
    pub t_cas: u64,

    /// RAS latency (row access strobe)
    #[serde(default = "MemoryConfig::default_t_ras")]
    pub t_ras: u64,

    /// Precharge latency
    #[serde(default = "MemoryConfig::default_t_pre")]
    pub t_pre: u64,

    /// DRAM row size in bytes
    #[serde(default = "MemoryConfig::default_row_bytes")]
    pub row_bytes: u64,
}

impl MemoryConfig {
    /// Returns the default fixed latency.
    const fn default_latency() -> u64 {
        defaults::MEMORY_LATENCY
    }

    /// Returns the default CAS latency.
    const fn default_t_cas() -> u64 {
        defaults::T_CAS
    }

    /// Returns the default RAS latency.
    const fn default_t_ras() -> u64 {
        defaults::T_RAS
    }

    /// Returns the default precharge latency.
    const fn default_t_pre() -> u64 {
        defaults::T_PRE
    }

    /// Returns the default DRAM row size.
    const fn default_row_bytes() -> u64 {
        defaults::ROW_BYTES
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            controller: MemoryController::default(),
            latency: defaults::MEMORY_LATENCY,
            t_cas: defaults::T_CAS,
            t_ras: defaults::T_RAS,
            t_pre: defaults::T_PRE,
            row_bytes: defaults::ROW_BYTES,
        }
    }
}

/// Protocol policy knobs consumed by [`crate::protocol::Protocol`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// State an owner keeps after snooping a peer's `R_REQ`.
    pub peer_read_downgrade: PeerReadPolicy,
    /// Land a read fill in `Exclusive` when no peer holds the line (`MEM_RESP`).
    /// When false every read fill lands in `Shared`.
    pub exclusive_fill: bool,
    /// Upgrade `Shared` to `Modified` with `WS_BCAST` and an `EN_ACCESS`
    /// acknowledgement instead of a full `RFO_BCAST` refill.
    pub shared_write_upgrade: bool,
}
