//! Conflict detection.
//!
//! Takes a schedule (or the planned routes) and per-train predicted
//! delays, shifts each train's items by its delay, and reports the train
//! pairs whose shifted use of a section or of clearance-linked sections
//! breaks the required gap. Each call recomputes the list from scratch.
//!
//! - [`record`] - conflict records, severities and predicted delays
//! - [`detect`] - detection over schedules and planned routes

pub mod detect;
pub mod record;

pub use detect::{detect_conflicts, detect_planned, nominal_schedule};
pub use record::{ConflictRecord, ConflictResource, PredictedDelays, Severity};

use std::collections::BTreeSet;

use crate::Id;

/// Trains named by at least one record.
pub fn conflicting_trains(records: &[ConflictRecord]) -> BTreeSet<Id> {
    records
        .iter()
        .flat_map(|r| r.trains())
        .map(str::to_string)
        .collect()
}
