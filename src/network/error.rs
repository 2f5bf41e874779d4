use thiserror::Error;

use crate::units::Time;
use crate::Id;

/// Input rejected before any solving begins.
///
/// Every variant names the offending field path, e.g.
/// `trains[A].route_sections[2]`, available through [`InputError::field`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("{field}: section id {id} is declared more than once")]
    DuplicateSection { field: String, id: Id },

    #[error("{field}: train id {id} is declared more than once")]
    DuplicateTrain { field: String, id: Id },

    #[error("{field}: unknown section {id}")]
    UnknownSection { field: String, id: Id },

    #[error("{field}: unknown train {id}")]
    UnknownTrain { field: String, id: Id },

    #[error("{field}: duration must be non-negative, got {value}")]
    NegativeDuration { field: String, value: Time },

    #[error("{field}: block window [{start}, {end}) is empty or inverted")]
    InvalidBlockWindow { field: String, start: Time, end: Time },

    #[error("{field}: platform capacity must be positive")]
    ZeroCapacity { field: String },

    #[error("{field}: priority must be positive")]
    ZeroPriority { field: String },

    #[error("{field}: route is empty")]
    EmptyRoute { field: String },

    #[error("{field}: section {id} appears more than once in the route")]
    RepeatedRouteSection { field: String, id: Id },

    #[error("{field}: a section cannot conflict with itself")]
    SelfConflict { field: String },
}

impl InputError {
    /// Path of the offending field.
    pub fn field(&self) -> &str {
        match self {
            InputError::DuplicateSection { field, .. }
            | InputError::DuplicateTrain { field, .. }
            | InputError::UnknownSection { field, .. }
            | InputError::UnknownTrain { field, .. }
            | InputError::NegativeDuration { field, .. }
            | InputError::InvalidBlockWindow { field, .. }
            | InputError::ZeroCapacity { field }
            | InputError::ZeroPriority { field }
            | InputError::EmptyRoute { field }
            | InputError::RepeatedRouteSection { field, .. }
            | InputError::SelfConflict { field } => field,
        }
    }
}

/// Rejects negative durations with the field path attached.
pub(crate) fn non_negative(field: impl FnOnce() -> String, value: Time) -> Result<Time, InputError> {
    if value < 0 {
        Err(InputError::NegativeDuration {
            field: field(),
            value,
        })
    } else {
        Ok(value)
    }
}
