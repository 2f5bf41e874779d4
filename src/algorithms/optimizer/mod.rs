//! Exact scheduler: branch-and-bound over resource orderings.
//!
//! Entry times are integer variables. Route order is a chain of difference
//! constraints; every other rule is either a single-sided exclusion
//! (block windows, fixed obligations), applied directly to lower bounds,
//! or a choice of which of two legs goes first:
//!
//! - [`disjunction`] - pairwise orderings and multi-slot platform cliques
//! - [`propagate`] - node bounds, longest-path propagation, explanations
//! - [`search`] - depth-first search with incumbent pruning
//!
//! A node's least solution bounds every schedule below it, and every cost
//! term only grows with entry times, so the least solution's cost is a
//! valid lower bound.

pub mod disjunction;
pub mod propagate;
pub mod search;

use crate::algorithms::{
    ConstraintKind, Cost, InfeasibleCause, Infeasibility, Objective, SchedulingAlgorithm, Solution,
    SolveError, SolveStats, SolveStatus,
};
use crate::config::SolverConfig;
use crate::network::Instance;
use crate::schedule::verify::certify;

use search::Search;

/// Budgeted exact scheduler.
#[derive(Debug, Clone, Default)]
pub struct BranchAndBound {
    config: SolverConfig,
}

impl BranchAndBound {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl SchedulingAlgorithm for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch_and_bound"
    }

    fn schedule(
        &self,
        instance: &Instance<'_>,
        objective: Objective,
    ) -> Result<Solution, SolveError> {
        let Some((first, first_leg)) = instance.legs().next() else {
            return Ok(Solution {
                schedule: instance.to_schedule(&[]),
                status: SolveStatus::Optimal,
                cost: Cost::ZERO,
                stats: SolveStats::default(),
                solver: self.name(),
            });
        };

        let outcome = Search::new(instance, objective, &self.config).run();
        let stats = SolveStats {
            nodes: outcome.nodes,
            elapsed: outcome.elapsed,
        };

        match (outcome.best, outcome.exhausted) {
            (Some((entries, cost)), exhausted) => {
                let schedule = instance.to_schedule(&entries);
                certify(instance, &schedule);
                let status = if exhausted {
                    SolveStatus::Optimal
                } else {
                    log::warn!(
                        "optimizer budget spent after {} nodes, returning incumbent",
                        stats.nodes
                    );
                    SolveStatus::Degraded
                };
                Ok(Solution {
                    schedule,
                    status,
                    cost,
                    stats,
                    solver: self.name(),
                })
            }
            (None, false) => Err(SolveError::Timeout {
                elapsed: stats.elapsed,
                nodes: stats.nodes,
            }),
            (None, true) => {
                let mut causes = outcome.failures;
                if causes.is_empty() {
                    // Nothing explained the failure; blame the first leg's horizon.
                    causes.push(InfeasibleCause {
                        train: instance.train(first.train).id.clone(),
                        section: instance.section(first_leg.section).id.clone(),
                        constraint: ConstraintKind::Horizon,
                        other_train: None,
                    });
                }
                Err(SolveError::Infeasible(Infeasibility::new(causes)))
            }
        }
    }
}
