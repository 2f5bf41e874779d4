use std::collections::BTreeMap;

use crate::units::Time;
use crate::Id;

/// A train movement request.
///
/// `route_sections` is traversed in order and may not revisit a section.
/// A missing `dwell_before` entry means no dwell.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainRequest {
    pub id: Id,
    /// Higher is scheduled preferentially.
    pub priority: u32,
    pub planned_departure: Time,
    pub route_sections: Vec<Id>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub dwell_before: BTreeMap<Id, Time>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub due_time: Option<Time>,
}

impl TrainRequest {
    pub fn new(
        id: impl Into<Id>,
        priority: u32,
        planned_departure: Time,
        route: impl IntoIterator<Item = impl Into<Id>>,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            planned_departure,
            route_sections: route.into_iter().map(Into::into).collect(),
            dwell_before: BTreeMap::new(),
            due_time: None,
        }
    }

    pub fn with_dwell(mut self, section: impl Into<Id>, seconds: Time) -> Self {
        self.dwell_before.insert(section.into(), seconds);
        self
    }

    pub fn due_at(mut self, due_time: Time) -> Self {
        self.due_time = Some(due_time);
        self
    }

    /// Minimum dwell before entering `section`.
    pub fn dwell_for(&self, section: &str) -> Time {
        self.dwell_before.get(section).copied().unwrap_or(0)
    }

    /// Last section of the route, if the route is non-empty.
    pub fn last_section(&self) -> Option<&str> {
        self.route_sections.last().map(String::as_str)
    }
}
