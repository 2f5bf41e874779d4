use std::fmt::Display;

use crate::units::Time;
use crate::Id;

/// One train's occupation of one section.
///
/// `exit_time - entry_time` equals the section's traverse time in every
/// schedule produced by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScheduleItem {
    pub train_id: Id,
    pub section_id: Id,
    pub entry_time: Time,
    pub exit_time: Time,
}

impl ScheduleItem {
    pub fn new(
        train_id: impl Into<Id>,
        section_id: impl Into<Id>,
        entry_time: Time,
        exit_time: Time,
    ) -> Self {
        Self {
            train_id: train_id.into(),
            section_id: section_id.into(),
            entry_time,
            exit_time,
        }
    }

    pub fn duration(&self) -> Time {
        self.exit_time - self.entry_time
    }

    /// Same item moved by `delta` seconds.
    pub fn shifted(&self, delta: Time) -> Self {
        Self {
            entry_time: self.entry_time + delta,
            exit_time: self.exit_time + delta,
            ..self.clone()
        }
    }
}

impl Display for ScheduleItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{} [{}, {})",
            self.train_id, self.section_id, self.entry_time, self.exit_time
        )
    }
}

/// Flat row for timeline charts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GanttRow {
    pub train: Id,
    pub section: Id,
    pub start: Time,
    pub end: Time,
}

impl From<&ScheduleItem> for GanttRow {
    fn from(item: &ScheduleItem) -> Self {
        Self {
            train: item.train_id.clone(),
            section: item.section_id.clone(),
            start: item.entry_time,
            end: item.exit_time,
        }
    }
}
