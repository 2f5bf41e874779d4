use crate::units::Time;
use crate::Id;
use std::collections::{BTreeMap, BTreeSet};
pub mod errors;
pub mod item;
pub mod verify;
pub use errors::*;
pub use item::*;
pub use verify::{verify, Violation, ViolationKind};


/// Set of schedule items, one per (train, section) pair.
///
/// A `Schedule` is indexed both by train and by section, so a train's
/// itinerary and a section's occupation order are each one lookup away.
///
/// # Internal Structure
/// - `by_train`: train id → section id → item
/// - `by_section`: section id → `(entry_time, train id)` in entry order
///
/// # Complexity
/// - `insert` / `remove`: O(log n)
/// - `get`: O(log n)
/// - `on_section`: O(log n + k) where k is the number of items on the section
///
/// # Examples
///
/// ```
/// use railsched::schedule::{Schedule, ScheduleItem};
///
/// let mut schedule = Schedule::new();
/// schedule.insert(ScheduleItem::new("A", "S1", 120, 220)).unwrap();
/// schedule.insert(ScheduleItem::new("B", "S1", 0, 100)).unwrap();
/// schedule.insert(ScheduleItem::new("A", "S2", 230, 260)).unwrap();
///
/// assert_eq!(schedule.len(), 3);
///
/// // Items on a section come back in entry order
/// let order: Vec<_> = schedule.on_section("S1").map(|i| i.train_id.as_str()).collect();
/// assert_eq!(order, ["B", "A"]);
///
/// assert_eq!(schedule.last_exit("A"), Some(260));
/// assert_eq!(schedule.makespan(), Some(260));
///
/// // A second item for the same pair is rejected
/// assert!(schedule.insert(ScheduleItem::new("A", "S1", 500, 600)).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    by_train: BTreeMap<Id, BTreeMap<Id, ScheduleItem>>,
    by_section: BTreeMap<Id, BTreeSet<(Time, Id)>>,
    len: usize,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schedule, rejecting duplicate pairs and negative occupancies.
    pub fn from_items(
        items: impl IntoIterator<Item = ScheduleItem>,
    ) -> Result<Self, ScheduleError> {
        let mut schedule = Self::new();
        for item in items {
            schedule.insert(item)?;
        }
        Ok(schedule)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts an item.
    ///
    /// Requires:
    /// - no item for the same (train, section) pair
    /// - `exit_time >= entry_time`
    pub fn insert(&mut self, item: ScheduleItem) -> Result<(), ScheduleError> {
        if item.exit_time < item.entry_time {
            return Err(ScheduleError::NegativeOccupancy {
                train_id: item.train_id,
                section_id: item.section_id,
                entry_time: item.entry_time,
                exit_time: item.exit_time,
            });
        }
        if self.get(&item.train_id, &item.section_id).is_some() {
            return Err(ScheduleError::DuplicateItem {
                train_id: item.train_id,
                section_id: item.section_id,
            });
        }
        self.upsert(item);
        Ok(())
    }

    /// Inserts or replaces the item for its (train, section) pair.
    pub(crate) fn upsert(&mut self, item: ScheduleItem) -> Option<ScheduleItem> {
        let previous = self.remove(&item.train_id, &item.section_id);
        self.by_section
            .entry(item.section_id.clone())
            .or_default()
            .insert((item.entry_time, item.train_id.clone()));
        self.by_train
            .entry(item.train_id.clone())
            .or_default()
            .insert(item.section_id.clone(), item);
        self.len += 1;
        previous
    }

    /// Removes the item for a (train, section) pair.
    pub fn remove(&mut self, train_id: &str, section_id: &str) -> Option<ScheduleItem> {
        let sections = self.by_train.get_mut(train_id)?;
        let item = sections.remove(section_id)?;
        if sections.is_empty() {
            self.by_train.remove(train_id);
        }
        if let Some(entries) = self.by_section.get_mut(section_id) {
            entries.remove(&(item.entry_time, item.train_id.clone()));
            if entries.is_empty() {
                self.by_section.remove(section_id);
            }
        }
        self.len -= 1;
        Some(item)
    }

    /// Removes every item of a train, returned in entry order.
    pub fn remove_train(&mut self, train_id: &str) -> Vec<ScheduleItem> {
        let sections: Vec<Id> = match self.by_train.get(train_id) {
            Some(s) => s.keys().cloned().collect(),
            None => return Vec::new(),
        };
        let mut removed: Vec<ScheduleItem> = sections
            .iter()
            .filter_map(|s| self.remove(train_id, s))
            .collect();
        removed.sort_by_key(|i| i.entry_time);
        removed
    }

    pub fn get(&self, train_id: &str, section_id: &str) -> Option<&ScheduleItem> {
        self.by_train.get(train_id)?.get(section_id)
    }

    pub fn contains_train(&self, train_id: &str) -> bool {
        self.by_train.contains_key(train_id)
    }

    /// Iterates over all items, grouped by train then section id.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduleItem> + '_ {
        self.by_train.values().flat_map(|s| s.values())
    }

    /// All items ordered by entry time, then train, then section.
    pub fn by_entry(&self) -> Vec<&ScheduleItem> {
        let mut items: Vec<_> = self.iter().collect();
        items.sort_by(|a, b| {
            (a.entry_time, &a.train_id, &a.section_id).cmp(&(
                b.entry_time,
                &b.train_id,
                &b.section_id,
            ))
        });
        items
    }

    /// A train's items in entry order.
    pub fn train_items(&self, train_id: &str) -> Vec<&ScheduleItem> {
        let mut items: Vec<_> = self
            .by_train
            .get(train_id)
            .map(|s| s.values().collect())
            .unwrap_or_default();
        items.sort_by_key(|i| i.entry_time);
        items
    }

    /// Items on a section in entry order.
    pub fn on_section<'a>(&'a self, section_id: &'a str) -> impl Iterator<Item = &'a ScheduleItem> + 'a {
        self.by_section
            .get(section_id)
            .into_iter()
            .flat_map(|entries| entries.iter())
            .filter_map(move |(_, train)| self.get(train, section_id))
    }

    pub fn train_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_train.keys().map(String::as_str)
    }

    pub fn section_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_section.keys().map(String::as_str)
    }

    pub fn train_count(&self) -> usize {
        self.by_train.len()
    }

    /// Entry into the train's first scheduled section.
    pub fn first_entry(&self, train_id: &str) -> Option<Time> {
        self.by_train
            .get(train_id)?
            .values()
            .map(|i| i.entry_time)
            .min()
    }

    /// Exit from the train's last scheduled section.
    pub fn last_exit(&self, train_id: &str) -> Option<Time> {
        self.by_train
            .get(train_id)?
            .values()
            .map(|i| i.exit_time)
            .max()
    }

    /// Returns the earliest entry time in the schedule, if any.
    pub fn earliest_entry(&self) -> Option<Time> {
        self.by_section
            .values()
            .filter_map(|e| e.first().map(|(t, _)| *t))
            .min()
    }

    /// Returns the latest exit time in the schedule, if any.
    pub fn latest_exit(&self) -> Option<Time> {
        self.iter().map(|i| i.exit_time).max()
    }

    /// Time from the earliest entry to the latest exit, if any items exist.
    pub fn makespan(&self) -> Option<Time> {
        Some(self.latest_exit()? - self.earliest_entry()?)
    }

    /// Sum of occupation durations on a section.
    pub fn occupied_time(&self, section_id: &str) -> Time {
        self.on_section(section_id).map(ScheduleItem::duration).sum()
    }

    /// Timeline rows ordered by start, then train.
    pub fn gantt(&self) -> Vec<GanttRow> {
        self.by_entry().into_iter().map(GanttRow::from).collect()
    }

    /// Clears all items from the schedule.
    pub fn clear(&mut self) {
        self.by_train.clear();
        self.by_section.clear();
        self.len = 0;
    }
}

impl Extend<ScheduleItem> for Schedule {
    /// Inserts or replaces each item.
    fn extend<I: IntoIterator<Item = ScheduleItem>>(&mut self, iter: I) {
        for item in iter {
            self.upsert(item);
        }
    }
}

// =============================================================================
// Schedule Serde Support
// =============================================================================

#[cfg(feature = "serde")]
mod serde_impl {
    use super::*;
    use serde::de::{self, SeqAccess, Visitor};
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    impl Serialize for Schedule {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut seq = serializer.serialize_seq(Some(self.len()))?;
            for item in self.by_entry() {
                seq.serialize_element(item)?;
            }
            seq.end()
        }
    }

    impl<'de> Deserialize<'de> for Schedule {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            struct ScheduleVisitor;

            impl<'de> Visitor<'de> for ScheduleVisitor {
                type Value = Schedule;

                fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a sequence of schedule items")
                }

                fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
                where
                    A: SeqAccess<'de>,
                {
                    let mut schedule = Schedule::new();
                    while let Some(item) = seq.next_element::<ScheduleItem>()? {
                        schedule.insert(item).map_err(de::Error::custom)?;
                    }
                    Ok(schedule)
                }
            }

            deserializer.deserialize_seq(ScheduleVisitor)
        }
    }
}
