//! Invariant verification.
//!
//! [`verify`] checks a full schedule against its network and requests and
//! lists every breach it finds. Solvers run the same checks on their own
//! output through [`certify`]; a breach there is a bug in the solver, not
//! a property of the input, and aborts.

use thiserror::Error;

use crate::network::{BlockPolicy, BlockWindows, Instance, Network, TimeWindow, TrainRequest};
use crate::schedule::Schedule;
use crate::units::Time;
use crate::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    Missing,
    Unexpected,
    Traverse,
    Release,
    RouteOrder,
    Headway,
    BlockWindow,
    Platform,
    Clearance,
}

/// One breached schedule invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("train {train} has no item on route section {section}")]
    Missing { train: Id, section: Id },

    #[error("train {train} has an item on {section}, which is not on its route")]
    Unexpected { train: Id, section: Id },

    #[error("train {train} occupies {section} for {actual}s, traverse is {expected}s")]
    Traverse {
        train: Id,
        section: Id,
        expected: Time,
        actual: Time,
    },

    #[error("train {train} enters {section} at {entry}, before its release at {release}")]
    Release {
        train: Id,
        section: Id,
        release: Time,
        entry: Time,
    },

    #[error("train {train} enters {section} at {entry}, earliest after {previous} is {earliest}")]
    RouteOrder {
        train: Id,
        previous: Id,
        section: Id,
        earliest: Time,
        entry: Time,
    },

    #[error("section {section}: {later} enters {gap}s after {earlier} exits, headway is {required}s")]
    Headway {
        section: Id,
        earlier: Id,
        later: Id,
        gap: Time,
        required: Time,
    },

    #[error("train {train} enters {section} at {entry}, inside blocked {window}")]
    BlockWindow {
        train: Id,
        section: Id,
        entry: Time,
        window: TimeWindow,
    },

    #[error("section {section}: {} trains dwell at {at}, capacity is {capacity}", trains.len())]
    Platform {
        section: Id,
        at: Time,
        capacity: u32,
        trains: Vec<Id>,
    },

    #[error("{train_a}@{section_a} and {train_b}@{section_b} enter {gap}s apart, clearance is {required}s")]
    Clearance {
        train_a: Id,
        section_a: Id,
        train_b: Id,
        section_b: Id,
        gap: Time,
        required: Time,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::Missing { .. } => ViolationKind::Missing,
            Violation::Unexpected { .. } => ViolationKind::Unexpected,
            Violation::Traverse { .. } => ViolationKind::Traverse,
            Violation::Release { .. } => ViolationKind::Release,
            Violation::RouteOrder { .. } => ViolationKind::RouteOrder,
            Violation::Headway { .. } => ViolationKind::Headway,
            Violation::BlockWindow { .. } => ViolationKind::BlockWindow,
            Violation::Platform { .. } => ViolationKind::Platform,
            Violation::Clearance { .. } => ViolationKind::Clearance,
        }
    }

    /// Trains involved in the breach.
    pub fn trains(&self) -> Vec<&str> {
        match self {
            Violation::Missing { train, .. }
            | Violation::Unexpected { train, .. }
            | Violation::Traverse { train, .. }
            | Violation::Release { train, .. }
            | Violation::RouteOrder { train, .. }
            | Violation::BlockWindow { train, .. } => vec![train.as_str()],
            Violation::Headway { earlier, later, .. } => vec![earlier.as_str(), later.as_str()],
            Violation::Platform { trains, .. } => trains.iter().map(String::as_str).collect(),
            Violation::Clearance {
                train_a, train_b, ..
            } => vec![train_a.as_str(), train_b.as_str()],
        }
    }

    pub fn involves(&self, train: &str) -> bool {
        self.trains().contains(&train)
    }
}

/// Checks every schedule invariant of `schedule` against `network` and
/// `trains`. An empty result means the schedule is valid.
pub fn verify(
    network: &Network,
    trains: &[TrainRequest],
    schedule: &Schedule,
    policy: BlockPolicy,
) -> Vec<Violation> {
    let mut out = Vec::new();

    for t in trains {
        let route: Vec<RouteStep<'_>> = t
            .route_sections
            .iter()
            .map(|id| RouteStep {
                section: id,
                dwell: t.dwell_for(id),
                traverse: network.get(id).map(|s| s.traverse_seconds),
            })
            .collect();
        check_route(&t.id, t.planned_departure, &route, schedule, &mut out);
    }
    for train in schedule.train_ids() {
        if !trains.iter().any(|t| t.id == train) {
            for item in schedule.train_items(train) {
                out.push(Violation::Unexpected {
                    train: item.train_id.clone(),
                    section: item.section_id.clone(),
                });
            }
        }
    }

    let forbidden: Vec<BlockWindows> = (0..network.len())
        .map(|s| {
            network
                .block_windows(s)
                .forbidden_entries(policy, network.section(s).traverse_seconds)
        })
        .collect();
    let mut occs = Vec::with_capacity(schedule.len());
    for item in schedule.iter() {
        let Some(section) = network.index_of(&item.section_id) else {
            continue;
        };
        let dwell = trains
            .iter()
            .find(|t| t.id == item.train_id)
            .map_or(0, |t| t.dwell_for(&item.section_id));
        occs.push(Occ {
            train: &item.train_id,
            section,
            entry: item.entry_time,
            exit: item.exit_time,
            dwell,
            fixed: false,
        });
    }
    check_resources(network, |s| &forbidden[s], occs, &mut out);
    out
}

/// Checks a solver's output for `inst`, including fixed obligations.
pub(crate) fn verify_instance(inst: &Instance<'_>, schedule: &Schedule) -> Vec<Violation> {
    let network = inst.network();
    let mut out = Vec::new();
    for plan in inst.trains() {
        let route: Vec<RouteStep<'_>> = plan
            .legs
            .iter()
            .map(|leg| RouteStep {
                section: &network.section(leg.section).id,
                dwell: leg.dwell,
                traverse: Some(leg.traverse),
            })
            .collect();
        check_route(&plan.id, plan.release, &route, schedule, &mut out);
    }

    let mut occs = Vec::with_capacity(schedule.len() + inst.fixed().len());
    for plan in inst.trains() {
        for leg in &plan.legs {
            if let Some(item) = schedule.get(&plan.id, &network.section(leg.section).id) {
                occs.push(Occ {
                    train: &plan.id,
                    section: leg.section,
                    entry: item.entry_time,
                    exit: item.exit_time,
                    dwell: leg.dwell,
                    fixed: false,
                });
            }
        }
    }
    for f in inst.fixed() {
        occs.push(Occ {
            train: &f.train_id,
            section: f.section,
            entry: f.entry,
            exit: f.exit,
            dwell: f.dwell,
            fixed: true,
        });
    }
    check_resources(network, |s| inst.forbidden(s), occs, &mut out);
    out
}

/// Aborts if a solver produced a schedule that breaks an invariant.
///
/// # Panics
///
/// Panics on any violation: the solver has a bug.
pub(crate) fn certify(inst: &Instance<'_>, schedule: &Schedule) {
    let violations = verify_instance(inst, schedule);
    if !violations.is_empty() {
        for v in &violations {
            log::error!("post-solve check failed: {v}");
        }
        panic!(
            "solver produced a schedule with {} invariant violation(s): {}",
            violations.len(),
            violations[0]
        );
    }
}

struct RouteStep<'a> {
    section: &'a str,
    dwell: Time,
    /// `None` when the section is unknown to the network.
    traverse: Option<Time>,
}

fn check_route(
    train: &str,
    release: Time,
    route: &[RouteStep<'_>],
    schedule: &Schedule,
    out: &mut Vec<Violation>,
) {
    let mut previous: Option<(&str, Time)> = None;
    for (k, step) in route.iter().enumerate() {
        let Some(item) = schedule.get(train, step.section) else {
            out.push(Violation::Missing {
                train: train.to_string(),
                section: step.section.to_string(),
            });
            previous = None;
            continue;
        };
        if let Some(expected) = step.traverse {
            if item.duration() != expected {
                out.push(Violation::Traverse {
                    train: train.to_string(),
                    section: step.section.to_string(),
                    expected,
                    actual: item.duration(),
                });
            }
        }
        if k == 0 && item.entry_time < release {
            out.push(Violation::Release {
                train: train.to_string(),
                section: step.section.to_string(),
                release,
                entry: item.entry_time,
            });
        }
        if let Some((prev, exit)) = previous {
            let earliest = exit + step.dwell;
            if item.entry_time < earliest {
                out.push(Violation::RouteOrder {
                    train: train.to_string(),
                    previous: prev.to_string(),
                    section: step.section.to_string(),
                    earliest,
                    entry: item.entry_time,
                });
            }
        }
        previous = Some((step.section, item.exit_time));
    }

    for item in schedule.train_items(train) {
        if !route.iter().any(|s| s.section == item.section_id) {
            out.push(Violation::Unexpected {
                train: train.to_string(),
                section: item.section_id.clone(),
            });
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Occ<'a> {
    train: &'a str,
    section: usize,
    entry: Time,
    exit: Time,
    dwell: Time,
    fixed: bool,
}

fn check_resources<'f>(
    network: &Network,
    forbidden: impl Fn(usize) -> &'f BlockWindows,
    occs: Vec<Occ<'_>>,
    out: &mut Vec<Violation>,
) {
    let mut per_section: Vec<Vec<Occ<'_>>> = vec![Vec::new(); network.len()];
    for o in occs {
        per_section[o.section].push(o);
    }
    for list in &mut per_section {
        list.sort_by(|a, b| (a.entry, a.train).cmp(&(b.entry, b.train)));
    }

    for (s, list) in per_section.iter().enumerate() {
        let section = network.section(s);
        let id = || section.id.clone();

        for o in list.iter().filter(|o| !o.fixed) {
            if let Some(window) = forbidden(s).window_at(o.entry) {
                out.push(Violation::BlockWindow {
                    train: o.train.to_string(),
                    section: id(),
                    entry: o.entry,
                    window,
                });
            }
        }

        let headway = section.headway_seconds;
        for (i, a) in list.iter().enumerate() {
            for b in &list[i + 1..] {
                if b.entry >= a.exit + headway {
                    break;
                }
                if a.train != b.train && !(a.fixed && b.fixed) {
                    out.push(Violation::Headway {
                        section: id(),
                        earlier: a.train.to_string(),
                        later: b.train.to_string(),
                        gap: b.entry - a.exit,
                        required: headway,
                    });
                }
            }
        }

        if let Some(capacity) = section.platform_capacity {
            check_platform(&id(), capacity, list, out);
        }

        for (other, clearance) in network.linked(s) {
            if other < s {
                continue;
            }
            for a in list {
                for b in &per_section[other] {
                    if a.train == b.train || (a.fixed && b.fixed) {
                        continue;
                    }
                    let gap = (a.entry - b.entry).abs();
                    if gap < clearance.seconds {
                        out.push(Violation::Clearance {
                            train_a: a.train.to_string(),
                            section_a: id(),
                            train_b: b.train.to_string(),
                            section_b: network.section(other).id.clone(),
                            gap,
                            required: clearance.seconds,
                        });
                    }
                }
            }
        }
    }
}

/// Reports instants where more than `capacity` pre-entry dwell intervals
/// overlap. Checking at interval starts suffices: any over-full instant is
/// preceded by an over-full start.
fn check_platform(section: &str, capacity: u32, list: &[Occ<'_>], out: &mut Vec<Violation>) {
    let dwelling: Vec<_> = list.iter().filter(|o| o.dwell > 0).collect();
    for start in &dwelling {
        let at = start.entry - start.dwell;
        let present: Vec<_> = dwelling
            .iter()
            .filter(|o| o.entry - o.dwell <= at && at < o.entry)
            .collect();
        if present.len() as u64 > u64::from(capacity) && present.iter().any(|o| !o.fixed) {
            let mut trains: Vec<Id> = present.iter().map(|o| o.train.to_string()).collect();
            trains.sort();
            out.push(Violation::Platform {
                section: section.to_string(),
                at,
                capacity,
                trains,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Section;
    use crate::schedule::ScheduleItem;

    fn schedule(items: &[(&str, &str, Time, Time)]) -> Schedule {
        Schedule::from_items(
            items
                .iter()
                .map(|&(t, s, a, b)| ScheduleItem::new(t, s, a, b)),
        )
        .unwrap()
    }

    fn kinds(v: &[Violation]) -> Vec<ViolationKind> {
        v.iter().map(Violation::kind).collect()
    }

    #[test]
    fn valid_schedule_has_no_violations() {
        let n = Network::new(vec![Section::new("S1", 120, 100)]).unwrap();
        let trains = [
            TrainRequest::new("A", 1, 0, ["S1"]),
            TrainRequest::new("B", 1, 0, ["S1"]),
        ];
        let s = schedule(&[("B", "S1", 0, 100), ("A", "S1", 220, 320)]);
        assert!(verify(&n, &trains, &s, BlockPolicy::EntryOnly).is_empty());
    }

    #[test]
    fn headway_breach_is_reported_once() {
        let n = Network::new(vec![Section::new("S1", 120, 100)]).unwrap();
        let trains = [
            TrainRequest::new("A", 1, 0, ["S1"]),
            TrainRequest::new("B", 1, 0, ["S1"]),
        ];
        let s = schedule(&[("B", "S1", 0, 100), ("A", "S1", 219, 319)]);
        let v = verify(&n, &trains, &s, BlockPolicy::EntryOnly);
        assert_eq!(kinds(&v), vec![ViolationKind::Headway]);
        assert!(v[0].involves("A") && v[0].involves("B"));
        assert!(v[0].to_string().contains("headway is 120s"));
    }

    #[test]
    fn route_order_and_release() {
        let n = Network::new(vec![Section::new("S1", 0, 10), Section::new("S2", 0, 10)]).unwrap();
        let trains = [TrainRequest::new("A", 1, 5, ["S1", "S2"]).with_dwell("S2", 30)];
        let s = schedule(&[("A", "S1", 0, 10), ("A", "S2", 20, 30)]);
        let v = verify(&n, &trains, &s, BlockPolicy::EntryOnly);
        assert_eq!(kinds(&v), vec![ViolationKind::Release, ViolationKind::RouteOrder]);
    }

    #[test]
    fn missing_unexpected_and_traverse() {
        let n = Network::new(vec![Section::new("S1", 0, 10), Section::new("S2", 0, 10)]).unwrap();
        let trains = [TrainRequest::new("A", 1, 0, ["S1"])];
        let s = schedule(&[("A", "S2", 0, 10), ("Z", "S1", 0, 9)]);
        let v = verify(&n, &trains, &s, BlockPolicy::EntryOnly);
        assert!(kinds(&v).contains(&ViolationKind::Missing));
        assert_eq!(
            kinds(&v).iter().filter(|k| **k == ViolationKind::Unexpected).count(),
            2
        );
    }

    #[test]
    fn entry_in_block_window() {
        let n = Network::new(vec![Section::new("S1", 0, 100).with_block_window(50, 200)]).unwrap();
        let trains = [TrainRequest::new("A", 1, 0, ["S1"])];
        let entry_only = schedule(&[("A", "S1", 0, 100)]);
        assert!(verify(&n, &trains, &entry_only, BlockPolicy::EntryOnly).is_empty());
        let v = verify(&n, &trains, &entry_only, BlockPolicy::Occupancy);
        assert_eq!(kinds(&v), vec![ViolationKind::BlockWindow]);

        let inside = schedule(&[("A", "S1", 60, 160)]);
        assert_eq!(
            kinds(&verify(&n, &trains, &inside, BlockPolicy::EntryOnly)),
            vec![ViolationKind::BlockWindow]
        );
    }

    #[test]
    fn platform_capacity_one_forbids_overlapping_dwell() {
        let n = Network::new(vec![
            Section::new("P", 0, 10),
            Section::new("S1", 0, 10).with_platform_capacity(1),
        ])
        .unwrap();
        let trains = [
            TrainRequest::new("A", 1, 0, ["P", "S1"]).with_dwell("S1", 60),
            TrainRequest::new("B", 1, 0, ["S1"]).with_dwell("S1", 60),
        ];
        // A dwells [10, 70), B dwells [-50, 10)
        let ok = schedule(&[("A", "P", 0, 10), ("A", "S1", 70, 80), ("B", "S1", 10, 20)]);
        assert!(verify(&n, &trains, &ok, BlockPolicy::EntryOnly).is_empty());

        let clash = schedule(&[("A", "P", 0, 10), ("A", "S1", 70, 80), ("B", "S1", 80, 90)]);
        let v = verify(&n, &trains, &clash, BlockPolicy::EntryOnly);
        assert_eq!(kinds(&v), vec![ViolationKind::Platform]);
    }

    #[test]
    fn clearance_between_linked_sections() {
        let n = Network::new(vec![
            Section::new("S1", 0, 10).conflicting_with("S2", 60),
            Section::new("S2", 0, 10),
        ])
        .unwrap();
        let trains = [
            TrainRequest::new("A", 1, 0, ["S1"]),
            TrainRequest::new("B", 1, 0, ["S2"]),
        ];
        let s = schedule(&[("A", "S1", 0, 10), ("B", "S2", 59, 69)]);
        let v = verify(&n, &trains, &s, BlockPolicy::EntryOnly);
        assert_eq!(kinds(&v), vec![ViolationKind::Clearance]);

        let s = schedule(&[("A", "S1", 0, 10), ("B", "S2", 60, 70)]);
        assert!(verify(&n, &trains, &s, BlockPolicy::EntryOnly).is_empty());
    }
}
