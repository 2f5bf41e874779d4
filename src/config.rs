//! Configuration for solving, conflict detection and resolution cycles.

use std::time::Duration;

use crate::algorithms::SolverChoice;
use crate::network::BlockPolicy;
use crate::units::Time;

/// Settings shared by both schedulers.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Minimum slack, past a leg's unconstrained earliest entry, that a
    /// train may be pushed back before the instance is declared infeasible.
    /// Raised automatically when the instance is congested enough to need it.
    pub horizon_seconds: Time,
    /// Wall-clock budget for the optimizer.
    pub time_budget: Duration,
    /// Optional cap on explored search nodes, for reproducible tests.
    pub node_limit: Option<u64>,
    /// Seed the optimizer's incumbent with the heuristic schedule.
    pub seed_with_heuristic: bool,
    /// How block windows restrict entries.
    pub block_policy: BlockPolicy,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            horizon_seconds: 86_400,
            time_budget: Duration::from_secs(5),
            node_limit: None,
            seed_with_heuristic: true,
            block_policy: BlockPolicy::EntryOnly,
        }
    }
}

/// Restricts conflict detection to a near-term window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Ignore items whose predicted entry is before this instant.
    pub as_of: Option<Time>,
    /// Ignore items whose predicted entry is later than `as_of + lookahead`
    /// (or later than `lookahead` when `as_of` is unset).
    pub lookahead: Option<Time>,
    /// Let a delay eat into slack between a train's planned departure and
    /// its scheduled first entry instead of shifting every entry by the
    /// full delay.
    pub absorb_slack: bool,
}

impl DetectorConfig {
    /// Returns true if a predicted entry falls inside the near-term window.
    pub fn in_window(&self, entry: Time) -> bool {
        let from = self.as_of.unwrap_or(Time::MIN);
        if entry < from {
            return false;
        }
        match self.lookahead {
            Some(ahead) => entry <= self.as_of.unwrap_or(0).saturating_add(ahead),
            None => true,
        }
    }

    /// How far a train's items move under its predicted delay.
    ///
    /// By default every entry moves by the whole delay. With `absorb_slack`
    /// a train cannot start before `departure + delay`, and a schedule that
    /// already starts it that late is not shifted.
    pub fn shift(&self, first_entry: Time, departure: Time, delay: Time) -> Time {
        if self.absorb_slack {
            (departure + delay - first_entry).max(0)
        } else {
            delay
        }
    }
}

/// Settings for the resolution orchestrator and control cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionConfig {
    pub solver: SolverChoice,
    /// Accept a degraded optimizer incumbent instead of re-running the
    /// heuristic.
    pub accept_degraded: bool,
    /// How far before the earliest movable release an unaffected train's
    /// use of a touched section is still held fixed. `None` derives it from
    /// the touched sections.
    pub interaction_margin: Option<Time>,
    /// Maximum DETECT → RESOLVE rounds per control cycle.
    pub max_rounds: u32,
    /// Items entered before this instant are committed and never moved.
    pub as_of: Option<Time>,
    /// OTP tolerance for the KPIs attached to audit events.
    pub kpi_tolerance: Time,
    pub solver_config: SolverConfig,
    pub detector: DetectorConfig,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Optimizer,
            accept_degraded: true,
            interaction_margin: None,
            max_rounds: 3,
            as_of: None,
            kpi_tolerance: 0,
            solver_config: SolverConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Sizing for the solver worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub threads: usize,
    /// Prefix for worker thread names.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            thread_name: "railsched-solver".to_string(),
        }
    }
}
