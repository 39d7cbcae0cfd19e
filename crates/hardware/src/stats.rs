//! Simulation statistics collection and reporting.
//!
//! This module tracks coherence activity for the whole system. It provides:
//! 1. **Summary:** Ticks simulated, accesses completed, host time.
//! 2. **Agents:** Hit and miss counts for local accesses.
//! 3. **Bus:** Grants, `HOLD_BUS` deferrals and idle (`NO_REQ`) rounds.
//! 4. **Coherence:** Interventions, writebacks and snoop invalidations.
//! 5. **Messages:** Per-kind counts of everything that crossed the bus.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

use crate::protocol::MessageKind;

/// Counters for one simulation run.
#[derive(Clone, Debug)]
pub struct CoherenceStats {
    start_time: Instant,
    /// Ticks executed.
    pub ticks: u64,
    /// Local accesses that completed without the bus.
    pub hits: u64,
    /// Local accesses that needed a bus transaction.
    pub misses: u64,
    /// Accesses completed, hits included.
    pub completions: u64,
    /// Requests granted by the arbiter.
    pub grants: u64,
    /// `HOLD_BUS` deferrals (lost arbitration or locked line).
    pub holds: u64,
    /// Ticks on which nobody requested the bus.
    pub idle_ticks: u64,
    /// `C_WB`/`C_FLUSH` interventions supplied by snoopers.
    pub interventions: u64,
    /// Dirty data written to memory (`WB_REQ`, `FLUSH`, `C_WB`, `C_FLUSH`).
    pub writebacks: u64,
    /// Lines invalidated in a snooper because of a peer's request.
    pub invalidations: u64,
    messages: [u64; MessageKind::COUNT],
}

impl Default for CoherenceStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            ticks: 0,
            hits: 0,
            misses: 0,
            completions: 0,
            grants: 0,
            holds: 0,
            idle_ticks: 0,
            interventions: 0,
            writebacks: 0,
            invalidations: 0,
            messages: [0; MessageKind::COUNT],
        }
    }
}

/// Serializable copy of [`CoherenceStats`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Ticks executed.
    pub ticks: u64,
    /// Local hits.
    pub hits: u64,
    /// Local misses.
    pub misses: u64,
    /// Completed accesses.
    pub completions: u64,
    /// Arbiter grants.
    pub grants: u64,
    /// `HOLD_BUS` deferrals.
    pub holds: u64,
    /// Idle rounds.
    pub idle_ticks: u64,
    /// Snooper interventions.
    pub interventions: u64,
    /// Dirty writebacks.
    pub writebacks: u64,
    /// Snoop invalidations.
    pub invalidations: u64,
    /// Per-kind message counts, keyed by message name; zero counts omitted.
    pub messages: BTreeMap<&'static str, u64>,
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"agents"`, `"bus"`, `"coherence"`, `"messages"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "agents", "bus", "coherence", "messages"];

impl CoherenceStats {
    /// Counts one message of `kind` on the bus.
    #[inline]
    pub const fn count(&mut self, kind: MessageKind) {
        self.messages[kind as usize] += 1;
    }

    /// Number of messages of `kind` seen so far.
    pub const fn messages(&self, kind: MessageKind) -> u64 {
        self.messages[kind as usize]
    }

    /// Returns a serializable copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks,
            hits: self.hits,
            misses: self.misses,
            completions: self.completions,
            grants: self.grants,
            holds: self.holds,
            idle_ticks: self.idle_ticks,
            interventions: self.interventions,
            writebacks: self.writebacks,
            invalidations: self.invalidations,
            messages: MessageKind::ALL
                .iter()
                .filter(|k| self.messages(**k) > 0)
                .map(|k| (k.name(), self.messages(*k)))
                .collect(),
        }
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Names from [`STATS_SECTIONS`], or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.start_time.elapsed().as_secs_f64();
        let ticks = self.ticks.max(1);

        if want("summary") {
            println!("\n==========================================================");
            println!("MESI COHERENCE SIMULATION STATISTICS");
            println!("==========================================================");
            println!("host_seconds             {seconds:.4} s");
            println!("sim_ticks                {}", self.ticks);
            println!("sim_accesses             {}", self.completions);
            println!(
                "sim_accesses_per_tick    {:.4}",
                self.completions as f64 / ticks as f64
            );
            println!("----------------------------------------------------------");
        }
        if want("agents") {
            let total = self.hits + self.misses;
            let rate = if total > 0 {
                (self.hits as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            println!("AGENTS");
            println!("  accesses               {total}");
            println!("  hits                   {}", self.hits);
            println!("  misses                 {}", self.misses);
            println!("  hit_rate               {rate:.2}%");
            println!("----------------------------------------------------------");
        }
        if want("bus") {
            println!("BUS");
            println!(
                "  bus.grants             {} ({:.2}%)",
                self.grants,
                (self.grants as f64 / ticks as f64) * 100.0
            );
            println!("  bus.holds              {}", self.holds);
            println!(
                "  bus.idle               {} ({:.2}%)",
                self.idle_ticks,
                (self.idle_ticks as f64 / ticks as f64) * 100.0
            );
            println!("----------------------------------------------------------");
        }
        if want("coherence") {
            println!("COHERENCE");
            println!("  interventions          {}", self.interventions);
            println!("  writebacks             {}", self.writebacks);
            println!("  invalidations          {}", self.invalidations);
            println!("----------------------------------------------------------");
        }
        if want("messages") {
            println!("MESSAGES");
            for kind in MessageKind::ALL {
                println!("  {:<22} {}", kind.name(), self.messages(kind));
            }
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
