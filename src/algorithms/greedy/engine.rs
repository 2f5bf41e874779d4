//! Reservation table and the earliest-entry search.

use crate::algorithms::{ConstraintKind, InfeasibleCause, Infeasibility};
use crate::network::{Instance, Leg};
use crate::units::Time;

use super::ordering::train_order;

/// A reserved occupation of one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Booking<'a> {
    pub train: &'a str,
    pub entry: Time,
    pub exit: Time,
    pub dwell: Time,
}

impl Booking<'_> {
    /// Pre-entry dwell interval `[entry - dwell, entry)`.
    fn dwell_start(&self) -> Time {
        self.entry - self.dwell
    }
}

/// Per-section reservations local to one solve.
#[derive(Debug, Clone)]
pub struct Reservations<'a> {
    on: Vec<Vec<Booking<'a>>>,
}

impl<'a> Reservations<'a> {
    /// Empty table with the instance's fixed obligations pre-booked.
    pub fn new(instance: &'a Instance<'_>) -> Self {
        let mut on = vec![Vec::new(); instance.network().len()];
        for f in instance.fixed() {
            on[f.section].push(Booking {
                train: &f.train_id,
                entry: f.entry,
                exit: f.exit,
                dwell: f.dwell,
            });
        }
        Self { on }
    }

    pub fn book(&mut self, section: usize, booking: Booking<'a>) {
        self.on[section].push(booking);
    }

    pub fn on(&self, section: usize) -> &[Booking<'a>] {
        &self.on[section]
    }
}

/// Why a leg could not be placed within its horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked {
    pub constraint: ConstraintKind,
    pub other_train: Option<String>,
}

/// Largest required push seen in one pass over the constraints.
struct Push<'a> {
    to: Time,
    kind: ConstraintKind,
    other: Option<&'a str>,
}

fn offer<'a>(push: &mut Option<Push<'a>>, to: Time, kind: ConstraintKind, other: Option<&'a str>) {
    if push.as_ref().map_or(true, |p| to > p.to) {
        *push = Some(Push { to, kind, other });
    }
}

/// Earliest entry `>= lower` for `leg` of `train` that is compatible with
/// every booking in `res`.
///
/// Each pass pushes the candidate past every constraint it currently
/// breaks; the candidate only grows, so the loop ends either at a fixpoint
/// or past `leg.latest`.
pub fn earliest_entry(
    instance: &Instance<'_>,
    res: &Reservations<'_>,
    train: &str,
    leg: &Leg,
    lower: Time,
    mut blocker: ConstraintKind,
) -> Result<Time, Blocked> {
    let network = instance.network();
    let s = leg.section;
    let section = network.section(s);
    let headway = section.headway_seconds;
    let mut other_train: Option<String> = None;
    let mut e = lower;

    loop {
        if e > leg.latest {
            return Err(Blocked {
                constraint: blocker,
                other_train,
            });
        }
        let mut push: Option<Push<'_>> = None;

        if let Some(w) = instance.forbidden(s).window_at(e) {
            offer(&mut push, w.end(), ConstraintKind::BlockWindow, None);
        }

        for b in res.on(s).iter().filter(|b| b.train != train) {
            if e < b.exit + headway && e + leg.traverse + headway > b.entry {
                offer(&mut push, b.exit + headway, ConstraintKind::Headway, Some(b.train));
            }
        }

        for (other, clearance) in network.linked(s) {
            for b in res.on(other).iter().filter(|b| b.train != train) {
                if (e - b.entry).abs() < clearance.seconds {
                    offer(
                        &mut push,
                        b.entry + clearance.seconds,
                        ConstraintKind::Clearance,
                        Some(b.train),
                    );
                }
            }
        }

        if let Some(capacity) = section.platform_capacity.filter(|_| leg.dwell > 0) {
            platform_push(res.on(s), train, e, leg.dwell, capacity, &mut push);
        }

        match push {
            Some(p) if p.to > e => {
                e = p.to;
                blocker = p.kind;
                other_train = p.other.map(str::to_string);
            }
            _ => return Ok(e),
        }
    }
}

/// Pushes a dwell interval `[e - dwell, e)` out of an over-full platform.
///
/// With capacity 1 every overlapping dwell must be cleared, so the push
/// goes past the last of them. With more slots the interval moves just
/// past the earliest-ending overlap and is re-checked.
fn platform_push<'a>(
    bookings: &[Booking<'a>],
    train: &str,
    e: Time,
    dwell: Time,
    capacity: u32,
    push: &mut Option<Push<'a>>,
) {
    let start = e - dwell;
    let overlapping: Vec<&Booking<'a>> = bookings
        .iter()
        .filter(|b| b.train != train && b.dwell > 0)
        .filter(|b| b.dwell_start() < e && start < b.entry)
        .collect();
    if overlapping.is_empty() {
        return;
    }

    if capacity == 1 {
        for b in &overlapping {
            offer(push, b.entry + dwell, ConstraintKind::Platform, Some(b.train));
        }
        return;
    }

    let instants = std::iter::once(start).chain(
        overlapping
            .iter()
            .map(|b| b.dwell_start())
            .filter(|&p| p > start && p < e),
    );
    let peak = instants
        .map(|p| {
            overlapping
                .iter()
                .filter(|b| b.dwell_start() <= p && p < b.entry)
                .count()
        })
        .max()
        .unwrap_or(0);
    if peak as u64 >= u64::from(capacity) {
        if let Some(b) = overlapping.iter().min_by_key(|b| b.entry) {
            offer(push, b.entry + dwell, ConstraintKind::Platform, Some(b.train));
        }
    }
}

/// Places every train in [`train_order`], each leg at its earliest
/// compatible entry. Returns per-train, per-leg entry times.
pub fn schedule_all(instance: &Instance<'_>) -> Result<Vec<Vec<Time>>, Infeasibility> {
    let network = instance.network();
    let mut res = Reservations::new(instance);
    let mut entries: Vec<Vec<Time>> = instance
        .trains()
        .iter()
        .map(|p| Vec::with_capacity(p.legs.len()))
        .collect();

    for t in train_order(instance) {
        let plan = instance.train(t);
        let mut prev_exit: Option<Time> = None;
        for leg in &plan.legs {
            let (lower, kind) = match prev_exit {
                None => (leg.earliest, ConstraintKind::Horizon),
                Some(exit) => (exit + leg.dwell, ConstraintKind::RouteOrder),
            };
            let entry = earliest_entry(instance, &res, &plan.id, leg, lower, kind).map_err(
                |blocked| {
                    log::debug!(
                        "train {} cannot enter {} before {}: {}",
                        plan.id,
                        network.section(leg.section).id,
                        leg.latest,
                        blocked.constraint
                    );
                    Infeasibility::new(vec![InfeasibleCause {
                        train: plan.id.clone(),
                        section: network.section(leg.section).id.clone(),
                        constraint: blocked.constraint,
                        other_train: blocked.other_train,
                    }])
                },
            )?;
            res.book(
                leg.section,
                Booking {
                    train: &plan.id,
                    entry,
                    exit: entry + leg.traverse,
                    dwell: leg.dwell,
                },
            );
            entries[t].push(entry);
            prev_exit = Some(entry + leg.traverse);
        }
    }
    Ok(entries)
}
