use cohsim_core::common::{Access, AgentId, Completion, RequestOutcome};
use cohsim_core::config::Config;
use cohsim_core::protocol::CoherenceState;
use cohsim_core::soc::{System, TickReport};
use cohsim_core::soc::memory::store::BackingStore;
use tracing_subscriber::EnvFilter;

/// Upper bound on ticks any single helper waits for.
const SETTLE_LIMIT: usize = 1_000;

/// Installs a test-writer subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Default configuration with `agents` agents and trace recording on.
pub fn config(agents: usize) -> Config {
    let mut config = Config::default();
    config.system.agents = agents;
    config.general.record_trace = true;
    config
}

pub struct TestSystem {
    pub sys: System,
    pub reports: Vec<TickReport>,
}

impl TestSystem {
    pub fn new(agents: usize) -> Self {
        Self::with_config(&config(agents))
    }

    pub fn with_config(config: &Config) -> Self {
        init_tracing();
        Self {
            sys: System::new(config).expect("valid config"),
            reports: Vec::new(),
        }
    }

    pub fn with_store(config: &Config, store: Box<dyn BackingStore>) -> Self {
        init_tracing();
        Self {
            sys: System::with_store(config, store).expect("valid config"),
            reports: Vec::new(),
        }
    }

    /// Issues an access without ticking.
    pub fn issue(&mut self, agent: u16, address: u64, access: Access) -> RequestOutcome {
        self.sys
            .request(AgentId::new(agent), address, access)
            .expect("request accepted")
    }

    /// Runs one tick and keeps its report.
    pub fn step(&mut self) -> TickReport {
        let report = self.sys.tick().expect("tick");
        self.reports.push(report.clone());
        report
    }

    /// Ticks until nothing is pending; returns every completion seen.
    pub fn settle(&mut self) -> Vec<Completion> {
        let mut done = Vec::new();
        for _ in 0..SETTLE_LIMIT {
            if self.sys.is_quiescent() {
                return done;
            }
            done.extend(self.step().completions);
        }
        panic!("system did not settle within {SETTLE_LIMIT} ticks");
    }

    /// Issues an access and ticks until it has completed; returns the payload.
    pub fn access(&mut self, agent: u16, address: u64, access: Access) -> u64 {
        match self.issue(agent, address, access) {
            RequestOutcome::Hit(value) => value,
            RequestOutcome::Pending => {
                let done = self.settle();
                done.iter()
                    .rev()
                    .find(|c| c.agent == AgentId::new(agent))
                    .map(|c| c.value)
                    .expect("access completed")
            }
        }
    }

    pub fn read(&mut self, agent: u16, address: u64) -> u64 {
        self.access(agent, address, Access::Read)
    }

    pub fn write(&mut self, agent: u16, address: u64, value: u64) {
        let _ = self.access(agent, address, Access::Write(value));
    }

    pub fn flush(&mut self, agent: u16, address: u64) {
        let _ = self.access(agent, address, Access::Flush);
    }

    pub fn state(&self, agent: u16, address: u64) -> CoherenceState {
        self.sys.state(AgentId::new(agent), address).expect("known agent")
    }

    /// States of `address` in every agent, in agent order.
    pub fn states(&self, address: u64) -> Vec<CoherenceState> {
        (0..self.sys.num_agents() as u16)
            .map(|a| self.state(a, address))
            .collect()
    }
}
