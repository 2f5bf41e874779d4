pub mod greedy;
pub mod optimizer;

mod error;
mod objective;

pub use error::{ConstraintKind, InfeasibleCause, Infeasibility, SolveError};
pub use greedy::GreedyScheduler;
pub use objective::{evaluate, Cost, Objective, ObjectiveHint};
pub use optimizer::BranchAndBound;

use std::time::Duration;

use crate::config::SolverConfig;
use crate::network::{Instance, Network, TrainRequest};
use crate::schedule::Schedule;

/// Algorithm producing a schedule for a validated instance.
///
/// Implementations keep all reservation state local to one call, so the
/// same value can serve concurrent solves.
pub trait SchedulingAlgorithm {
    fn name(&self) -> &'static str;

    /// Schedule every train of `instance` under `objective`.
    ///
    /// # Returns
    ///
    /// A [`Solution`] whose schedule satisfies every invariant of the
    /// instance, or the reason none was produced.
    fn schedule(&self, instance: &Instance<'_>, objective: Objective)
        -> Result<Solution, SolveError>;
}

/// Which scheduler to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolverChoice {
    /// Single forward pass; fast, feasible, possibly suboptimal.
    Heuristic,
    /// Exact branch-and-bound within a time budget.
    #[default]
    Optimizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Feasible, with no optimality claim (heuristic result).
    Feasible,
    /// Best incumbent when the optimizer's budget ran out.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveStats {
    pub nodes: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub schedule: Schedule,
    pub status: SolveStatus,
    pub cost: Cost,
    pub stats: SolveStats,
    /// Name of the algorithm that produced the schedule.
    pub solver: &'static str,
}

impl Solution {
    pub fn is_degraded(&self) -> bool {
        self.status == SolveStatus::Degraded
    }
}

/// Solves a validated instance with the chosen scheduler.
///
/// An optimizer run that exhausts its budget without any incumbent falls
/// back to the heuristic.
pub fn solve_instance(
    instance: &Instance<'_>,
    choice: SolverChoice,
    hint: ObjectiveHint,
    config: &SolverConfig,
) -> Result<Solution, SolveError> {
    let objective = Objective::resolve(hint, instance);
    match choice {
        SolverChoice::Heuristic => GreedyScheduler.schedule(instance, objective),
        SolverChoice::Optimizer => {
            match BranchAndBound::new(config.clone()).schedule(instance, objective) {
                Err(SolveError::Timeout { elapsed, nodes }) => {
                    log::warn!(
                        "optimizer found no incumbent in {elapsed:?} ({nodes} nodes), falling back to heuristic"
                    );
                    GreedyScheduler.schedule(instance, objective)
                }
                other => other,
            }
        }
    }
}

/// Validates the inputs and solves them.
pub fn solve(
    network: &Network,
    trains: &[TrainRequest],
    choice: SolverChoice,
    hint: ObjectiveHint,
    config: &SolverConfig,
) -> Result<Solution, SolveError> {
    let instance = Instance::new(network, trains, config)?;
    solve_instance(&instance, choice, hint, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Section;

    #[test]
    fn invalid_input_is_rejected_before_solving() {
        let n = Network::new(vec![Section::new("S1", 0, 10)]).unwrap();
        let t = [TrainRequest::new("A", 1, 0, ["S2"])];
        for choice in [SolverChoice::Heuristic, SolverChoice::Optimizer] {
            let err = solve(&n, &t, choice, ObjectiveHint::Auto, &SolverConfig::default())
                .unwrap_err();
            assert!(matches!(err, SolveError::InvalidInput(_)));
        }
    }

    #[test]
    fn both_choices_solve_a_single_train() {
        let n = Network::new(vec![Section::new("S1", 0, 10)]).unwrap();
        let t = [TrainRequest::new("A", 1, 5, ["S1"])];
        for choice in [SolverChoice::Heuristic, SolverChoice::Optimizer] {
            let s = solve(&n, &t, choice, ObjectiveHint::Auto, &SolverConfig::default()).unwrap();
            assert_eq!(s.schedule.get("A", "S1").unwrap().entry_time, 5);
        }
    }

    #[test]
    fn zero_budget_optimizer_falls_back_or_degrades() {
        let n = Network::new(vec![Section::new("S1", 10, 10)]).unwrap();
        let t: Vec<_> = (0..4)
            .map(|i| TrainRequest::new(format!("T{i}"), 1, 0, ["S1"]))
            .collect();
        let config = SolverConfig {
            time_budget: Duration::ZERO,
            seed_with_heuristic: false,
            ..SolverConfig::default()
        };
        let s = solve(&n, &t, SolverChoice::Optimizer, ObjectiveHint::Auto, &config).unwrap();
        assert_eq!(s.schedule.len(), 4);
        assert_ne!(s.status, SolveStatus::Optimal);
    }
}
