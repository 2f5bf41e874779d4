//! Schedule cost.
//!
//! Costs compare lexicographically on `(primary, secondary, tertiary)`.
//! Every component is non-decreasing in every entry time, so the cost of
//! a set of lower bounds is a lower bound on the cost of any schedule that
//! respects them.

use std::cmp::Ordering;

use crate::network::Instance;
use crate::units::Time;

/// Caller's choice of objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ObjectiveHint {
    /// Lateness if any train has a due time, promptness otherwise.
    #[default]
    Auto,
    Lateness,
    Promptness,
}

/// Resolved objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Σ priority · max(0, exit_last − due)
    Lateness,
    /// Σ priority · entry_first
    Promptness,
}

impl Objective {
    pub fn resolve(hint: ObjectiveHint, instance: &Instance<'_>) -> Self {
        match hint {
            ObjectiveHint::Lateness => Objective::Lateness,
            ObjectiveHint::Promptness => Objective::Promptness,
            ObjectiveHint::Auto if instance.has_due_times() => Objective::Lateness,
            ObjectiveHint::Auto => Objective::Promptness,
        }
    }
}

/// Lexicographic schedule cost.
///
/// - `primary`: the objective proper
/// - `secondary`: Σ exit_last / max(due, 1) over trains with a due time,
///   so trains due earlier finish earlier among equal-primary schedules
/// - `tertiary`: Σ priority · exit_last, keeping trains without a due time prompt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cost {
    pub primary: i64,
    pub secondary: f64,
    pub tertiary: i64,
}

impl Cost {
    pub const ZERO: Cost = Cost {
        primary: 0,
        secondary: 0.0,
        tertiary: 0,
    };

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.primary
            .cmp(&other.primary)
            .then_with(|| self.secondary.total_cmp(&other.secondary))
            .then_with(|| self.tertiary.cmp(&other.tertiary))
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.total_cmp(other))
    }
}

/// Cost of per-train, per-leg entry times.
pub fn evaluate(instance: &Instance<'_>, objective: Objective, entries: &[Vec<Time>]) -> Cost {
    let mut cost = Cost::ZERO;
    for (plan, times) in instance.trains().iter().zip(entries) {
        let (Some(&first), Some(&last), Some(last_leg)) =
            (times.first(), times.last(), plan.legs.last())
        else {
            continue;
        };
        let priority = i64::from(plan.priority);
        let exit = last + last_leg.traverse;
        match objective {
            Objective::Lateness => {
                if let Some(due) = plan.due {
                    cost.primary += priority * (exit - due).max(0);
                }
            }
            Objective::Promptness => cost.primary += priority * first,
        }
        if let Some(due) = plan.due {
            cost.secondary += exit as f64 / due.max(1) as f64;
        }
        cost.tertiary += priority * exit;
    }
    cost
}
