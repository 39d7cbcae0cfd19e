//! MESI coherence simulator CLI.
//!
//! This binary runs a workload file against a configured coherence domain. It performs:
//! 1. **Configuration:** Built-in defaults, optionally overridden by a JSON file and flags.
//! 2. **Run:** Feeds the workload through the simulator until every access completes.
//! 3. **Output:** Optional JSON-lines event log, and statistics as text or JSON.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cohsim_core::config::Config;
use cohsim_core::sim::{Simulator, Workload};
use cohsim_core::soc::System;
use cohsim_core::stats::STATS_SECTIONS;
use cohsim_core::trace::{LogSink, TraceEvent, TraceSink};

#[derive(Parser, Debug)]
#[command(
    name = "cohsim",
    author,
    version,
    about = "Snooping MESI cache-coherence simulator",
    long_about = "Run a workload of loads, stores and flushes across agents sharing one bus.\n\nWorkload lines: `<agent> <R|W|F> <address> [value]`, `X F <address>` for an external flush.\n\nExamples:\n  cohsim run --workload traces/pingpong.txt\n  cohsim run -w traces/pingpong.txt --agents 4 --events events.jsonl --stats bus,coherence"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workload file.
    Run {
        /// Workload file to execute.
        #[arg(short, long)]
        workload: PathBuf,

        /// JSON configuration file; omitted fields keep their defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of agents (overrides the configuration).
        #[arg(long)]
        agents: Option<usize>,

        /// Write every trace event as one JSON object per line.
        #[arg(long)]
        events: Option<PathBuf>,

        /// Comma-separated statistics sections to print; empty prints all.
        #[arg(long, value_delimiter = ',')]
        stats: Vec<String>,

        /// Print statistics as JSON instead of text.
        #[arg(long)]
        stats_json: bool,

        /// Stop after this many ticks (overrides the configuration).
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

/// Trace sink writing one JSON object per line.
#[derive(Debug)]
struct JsonLinesSink {
    out: BufWriter<File>,
    error: Option<io::Error>,
}

impl JsonLinesSink {
    fn create(path: &Path) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            error: None,
        })
    }

    fn write_event(&mut self, event: &TraceEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")
    }
}

impl TraceSink for JsonLinesSink {
    fn record(&mut self, event: &TraceEvent) {
        if self.error.is_none()
            && let Err(e) = self.write_event(event)
        {
            self.error = Some(e);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()
    }
}

struct RunArgs {
    workload: PathBuf,
    config: Option<PathBuf>,
    agents: Option<usize>,
    events: Option<PathBuf>,
    stats: Vec<String>,
    stats_json: bool,
    max_ticks: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            workload,
            config,
            agents,
            events,
            stats,
            stats_json,
            max_ticks,
        } => cmd_run(&RunArgs {
            workload,
            config,
            agents,
            events,
            stats,
            stats_json,
            max_ticks,
        }),
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Loads configuration and workload, runs to completion and reports.
fn cmd_run(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let workload = Workload::from_file(&args.workload)?;
    if let Some(agents) = args.agents {
        config.system.agents = agents;
    } else if let Some(max) = workload.max_agent() {
        config.system.agents = config.system.agents.max(max.index() + 1);
    }
    if let Some(max_ticks) = args.max_ticks {
        config.general.max_ticks = max_ticks;
    }
    if let Some(unknown) = args
        .stats
        .iter()
        .find(|s| !STATS_SECTIONS.contains(&s.as_str()))
    {
        return Err(format!(
            "unknown stats section `{unknown}` (expected one of {})",
            STATS_SECTIONS.join(", ")
        )
        .into());
    }

    let mut system = System::new(&config)?;
    system.add_sink(Box::new(LogSink));
    if let Some(path) = &args.events {
        system.add_sink(Box::new(JsonLinesSink::create(path)?));
    }

    info!(
        agents = config.system.agents,
        accesses = workload.len(),
        "starting run"
    );
    let mut sim = Simulator::new(system, &workload);
    let outcome = sim.run(config.general.max_ticks);
    sim.system.flush_sinks()?;
    let summary = outcome?;

    if args.stats_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&sim.system.stats().snapshot())?
        );
    } else {
        sim.system.stats().print_sections(&args.stats);
    }

    if !summary.finished {
        return Err(format!(
            "tick limit {} reached with {} of {} accesses completed",
            config.general.max_ticks,
            summary.completed,
            workload.len()
        )
        .into());
    }
    Ok(())
}
