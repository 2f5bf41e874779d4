use std::fmt::Display;
use std::time::Duration;

use thiserror::Error;

use crate::network::InputError;
use crate::Id;

/// The kind of constraint that pushed a train past its horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConstraintKind {
    BlockWindow,
    Headway,
    Platform,
    Clearance,
    /// Route order and dwell from the train's previous section.
    RouteOrder,
    /// Release time or horizon cap with no other constraint involved.
    Horizon,
}

impl Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConstraintKind::BlockWindow => "block window",
            ConstraintKind::Headway => "headway",
            ConstraintKind::Platform => "platform capacity",
            ConstraintKind::Clearance => "clearance",
            ConstraintKind::RouteOrder => "route order",
            ConstraintKind::Horizon => "planning horizon",
        };
        f.write_str(s)
    }
}

/// One element of an infeasibility explanation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InfeasibleCause {
    pub train: Id,
    pub section: Id,
    pub constraint: ConstraintKind,
    /// The other train involved, for pairwise constraints.
    pub other_train: Option<Id>,
}

impl Display for InfeasibleCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "train {} on {}: {}", self.train, self.section, self.constraint)?;
        if let Some(other) = &self.other_train {
            write!(f, " with {other}")?;
        }
        Ok(())
    }
}

/// Non-empty explanation of why no schedule exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Infeasibility {
    causes: Vec<InfeasibleCause>,
}

impl Infeasibility {
    /// # Panics
    ///
    /// Panics if `causes` is empty.
    pub fn new(mut causes: Vec<InfeasibleCause>) -> Self {
        assert!(!causes.is_empty(), "an infeasibility needs at least one cause");
        causes.sort();
        causes.dedup();
        Self { causes }
    }

    pub fn causes(&self) -> &[InfeasibleCause] {
        &self.causes
    }

    /// Returns true if some cause names `train`.
    pub fn involves(&self, train: &str) -> bool {
        self.causes.iter().any(|c| c.train == train)
    }

    pub fn has_kind(&self, kind: ConstraintKind) -> bool {
        self.causes.iter().any(|c| c.constraint == kind)
    }
}

impl Display for Infeasibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, c) in self.causes.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("no feasible schedule: {0}")]
    Infeasible(Infeasibility),

    #[error("time budget exhausted after {elapsed:?} and {nodes} nodes with no feasible schedule")]
    Timeout { elapsed: Duration, nodes: u64 },
}
