//! Targeted re-solving of conflicting trains.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::algorithms::{solve_instance, ObjectiveHint, Solution, SolveError, SolverChoice};
use crate::config::ResolutionConfig;
use crate::conflicts::{conflicting_trains, ConflictRecord, PredictedDelays};
use crate::network::{InputError, Network, TrainRequest};
use crate::schedule::{verify, Schedule, Violation};
use crate::Id;

use super::merge::merge;
use super::reduce::reduce;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error(transparent)]
    Solve(#[from] SolveError),

    /// The merged schedule still breaks constraints involving a re-solved
    /// train; only possible with an interaction margin set too small.
    #[error("merged schedule breaks {} constraints involving re-solved trains", .0.len())]
    Unresolved(Vec<Violation>),
}

/// Outcome of one resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub schedule: Schedule,
    /// Solver result for the reduced instance; `None` when there was
    /// nothing to re-solve.
    pub solution: Option<Solution>,
    pub movable: BTreeSet<Id>,
    pub fixed: usize,
}

impl Resolution {
    /// Delays still ahead of the resolved schedule. A re-solved train
    /// already carries its delay, so it only stays pending under the
    /// slack-absorbing model, where shifting again is a no-op.
    pub fn outstanding(&self, delays: &PredictedDelays, config: &ResolutionConfig) -> PredictedDelays {
        let mut pending = delays.clone();
        if !config.detector.absorb_slack {
            for id in &self.movable {
                pending.remove(id);
            }
        }
        pending
    }

    fn unchanged(schedule: &Schedule) -> Self {
        Self {
            schedule: schedule.clone(),
            solution: None,
            movable: BTreeSet::new(),
            fixed: 0,
        }
    }
}

/// Re-solves the trains named in `conflicts` and merges them back.
///
/// With no conflicts the schedule is returned unchanged.
pub fn resolve(
    network: &Network,
    trains: &[TrainRequest],
    schedule: &Schedule,
    conflicts: &[ConflictRecord],
    config: &ResolutionConfig,
) -> Result<Schedule, ResolveError> {
    resolve_with_delays(
        network,
        trains,
        schedule,
        conflicts,
        &PredictedDelays::new(),
        config,
    )
    .map(|r| r.schedule)
}

/// [`resolve`] with predicted delays pushing back the movable trains'
/// release.
pub fn resolve_with_delays(
    network: &Network,
    trains: &[TrainRequest],
    schedule: &Schedule,
    conflicts: &[ConflictRecord],
    delays: &PredictedDelays,
    config: &ResolutionConfig,
) -> Result<Resolution, ResolveError> {
    if conflicts.is_empty() {
        return Ok(Resolution::unchanged(schedule));
    }

    let candidates = conflicting_trains(conflicts);
    let reduced = reduce(network, trains, schedule, &candidates, delays, config)?;
    if reduced.is_empty() {
        log::debug!("every conflicting train is committed, nothing to re-solve");
        return Ok(Resolution::unchanged(schedule));
    }

    let instance = reduced.instance(&config.solver_config)?;
    let mut solution = solve_instance(
        &instance,
        config.solver,
        ObjectiveHint::Auto,
        &config.solver_config,
    )?;
    if solution.is_degraded() && !config.accept_degraded {
        log::warn!("rejecting degraded optimizer result, re-solving with the heuristic");
        solution = solve_instance(
            &instance,
            SolverChoice::Heuristic,
            ObjectiveHint::Auto,
            &config.solver_config,
        )?;
    }

    let merged = merge(schedule, &solution.schedule, &reduced.movable);
    let violations: Vec<Violation> = verify(
        network,
        trains,
        &merged,
        config.solver_config.block_policy,
    )
    .into_iter()
    .filter(|v| reduced.movable.iter().any(|m| v.involves(m)))
    .collect();
    if !violations.is_empty() {
        return Err(ResolveError::Unresolved(violations));
    }

    log::debug!(
        "resolved {} trains against {} fixed obligations with {} ({:?})",
        reduced.movable.len(),
        reduced.fixed.len(),
        solution.solver,
        solution.status
    );
    Ok(Resolution {
        schedule: merged,
        fixed: reduced.fixed.len(),
        movable: reduced.movable,
        solution: Some(solution),
    })
}
