//! railsched - train precedence scheduling and conflict resolution
//!
//! Computes per-section entry and exit times for train movements over a
//! network of track sections with headway, block window, platform and
//! clearance rules. Two schedulers share one constraint set: a single-pass
//! heuristic and a branch-and-bound optimizer. On top of them sit conflict
//! detection from predicted delays, targeted re-solving of the conflicting
//! trains, and a versioned live schedule driven by a control cycle.

pub mod algorithms;
pub mod config;
pub mod conflicts;
pub mod kpi;
pub mod network;
pub mod resolution;
pub mod schedule;
pub mod units;

pub use algorithms::{solve, ObjectiveHint, Solution, SolveError, SolveStatus, SolverChoice};
pub use config::{DetectorConfig, PoolConfig, ResolutionConfig, SolverConfig};
pub use conflicts::{detect_conflicts, ConflictRecord, PredictedDelays, Severity};
pub use kpi::{evaluate, KpiReport};
pub use network::{InputError, Network, Section, TrainRequest};
pub use resolution::{resolve, run_cycle, LiveSchedule, ResolveError};
pub use schedule::{Schedule, ScheduleItem};
pub use units::{SameDim, Time};

/// Identifier type used for sections, trains and cycle runs.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests;
