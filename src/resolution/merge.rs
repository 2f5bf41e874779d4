//! Merging a re-solved partial schedule into the full one.

use std::collections::BTreeSet;

use crate::schedule::Schedule;
use crate::Id;

/// Copy of `base` in which every item of a `movable` train that `partial`
/// re-scheduled is replaced. Items of other trains, and committed items
/// the partial schedule does not cover, are kept unchanged.
pub fn merge(base: &Schedule, partial: &Schedule, movable: &BTreeSet<Id>) -> Schedule {
    let mut merged = base.clone();
    for train in movable {
        for item in partial.train_items(train) {
            merged.upsert(item.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleItem;

    #[test]
    fn replaces_only_movable_items() {
        let base = Schedule::from_items([
            ScheduleItem::new("A", "S1", 0, 100),
            ScheduleItem::new("A", "S2", 100, 200),
            ScheduleItem::new("B", "S1", 50, 150),
        ])
        .unwrap();
        let partial = Schedule::from_items([
            ScheduleItem::new("A", "S2", 300, 400),
            ScheduleItem::new("B", "S1", 999, 1099),
        ])
        .unwrap();
        let movable: BTreeSet<Id> = ["A".to_string()].into();
        let merged = merge(&base, &partial, &movable);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get("A", "S1").unwrap().entry_time, 0);
        assert_eq!(merged.get("A", "S2").unwrap().entry_time, 300);
        // B was not movable; its partial item is ignored.
        assert_eq!(merged.get("B", "S1").unwrap().entry_time, 50);
    }

    #[test]
    fn empty_partial_is_identity() {
        let base = Schedule::from_items([ScheduleItem::new("A", "S1", 0, 100)]).unwrap();
        let merged = merge(&base, &Schedule::new(), &BTreeSet::new());
        assert_eq!(merged, base);
    }
}
