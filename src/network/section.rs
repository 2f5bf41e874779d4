use std::collections::BTreeMap;

use crate::units::Time;
use crate::Id;

/// A track section as supplied by the caller.
///
/// Field names are the exchange schema shared with any surrounding API.
/// The value is plain data; [`Network::new`](super::Network::new) validates
/// and indexes it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Section {
    pub id: Id,
    /// Minimum gap between one train's exit and the next train's entry.
    pub headway_seconds: Time,
    /// Fixed occupancy duration.
    pub traverse_seconds: Time,
    /// Closed-open intervals during which entry is forbidden.
    #[cfg_attr(feature = "serde", serde(default))]
    pub block_windows: Vec<(Time, Time)>,
    /// `Some(1)` makes pre-entry dwell exclusive; `Some(n)` allows `n`
    /// parallel dwell slots.
    #[cfg_attr(feature = "serde", serde(default))]
    pub platform_capacity: Option<u32>,
    /// Other section id → clearance seconds between entries.
    #[cfg_attr(feature = "serde", serde(default))]
    pub conflicts_with: BTreeMap<Id, Time>,
    /// Group id → clearance seconds declared by this section for the group.
    #[cfg_attr(feature = "serde", serde(default))]
    pub conflict_groups: BTreeMap<Id, Time>,
}

impl Section {
    pub fn new(id: impl Into<Id>, headway_seconds: Time, traverse_seconds: Time) -> Self {
        Self {
            id: id.into(),
            headway_seconds,
            traverse_seconds,
            block_windows: Vec::new(),
            platform_capacity: None,
            conflicts_with: BTreeMap::new(),
            conflict_groups: BTreeMap::new(),
        }
    }

    pub fn with_block_window(mut self, start: Time, end: Time) -> Self {
        self.block_windows.push((start, end));
        self
    }

    pub fn with_platform_capacity(mut self, capacity: u32) -> Self {
        self.platform_capacity = Some(capacity);
        self
    }

    pub fn conflicting_with(mut self, other: impl Into<Id>, clearance_seconds: Time) -> Self {
        self.conflicts_with.insert(other.into(), clearance_seconds);
        self
    }

    pub fn in_group(mut self, group: impl Into<Id>, clearance_seconds: Time) -> Self {
        self.conflict_groups.insert(group.into(), clearance_seconds);
        self
    }
}
