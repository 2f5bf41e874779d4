use thiserror::Error;

use crate::units::Time;
use crate::Id;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The (train, section) pair already has an item
    #[error("Train {train_id} already has an item on section {section_id}")]
    DuplicateItem { train_id: Id, section_id: Id },

    /// Exit precedes entry
    #[error("Train {train_id} exits section {section_id} at {exit_time} before entering at {entry_time}")]
    NegativeOccupancy {
        train_id: Id,
        section_id: Id,
        entry_time: Time,
        exit_time: Time,
    },
}
