//! Feasible heuristic scheduler.
//!
//! A single forward pass with no backtracking:
//!
//! 1. **Ordering**: trains are processed by priority (descending), then
//!    release (ascending), then id.
//! 2. **Placement**: each train walks its route; every leg is placed at the
//!    earliest entry that is simultaneously
//!    - no earlier than the previous exit plus dwell (or the release),
//!    - outside every forbidden entry window,
//!    - clear of every reservation on the section by headway,
//!    - clear of every reservation on a linked section by clearance,
//!    - within platform capacity for its pre-entry dwell.
//! 3. **Reservation**: the chosen occupation is booked before the next leg.
//!
//! Fixed obligations are booked up front. The pass always terminates and
//! fails only when a leg is pushed past its horizon.
//!
//! # Module Structure
//!
//! - [`ordering`] - train comparison
//! - [`engine`] - reservation table and earliest-entry search

pub(crate) mod engine;
mod ordering;

use std::time::Instant;

use crate::network::Instance;
use crate::schedule::verify::certify;

use super::{evaluate, Objective, SchedulingAlgorithm, Solution, SolveError, SolveStats, SolveStatus};

/// Forward-pass heuristic scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyScheduler;

impl SchedulingAlgorithm for GreedyScheduler {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn schedule(
        &self,
        instance: &Instance<'_>,
        objective: Objective,
    ) -> Result<Solution, SolveError> {
        let started = Instant::now();
        let entries = engine::schedule_all(instance).map_err(SolveError::Infeasible)?;
        let schedule = instance.to_schedule(&entries);
        certify(instance, &schedule);
        let cost = evaluate(instance, objective, &entries);
        log::debug!(
            "greedy placed {} legs of {} trains, cost {:?}",
            instance.leg_count(),
            instance.trains().len(),
            cost
        );
        Ok(Solution {
            schedule,
            status: SolveStatus::Feasible,
            cost,
            stats: SolveStats {
                nodes: 0,
                elapsed: started.elapsed(),
            },
            solver: self.name(),
        })
    }
}
