//! Reduced instances around conflicting trains.
//!
//! The movable trains keep only the part of their route not yet committed.
//! Everything else that could interact with them on a touched section is
//! carried along as a fixed obligation. A non-movable item whose exit is
//! more than the interaction margin before the earliest movable release
//! cannot constrain any movable entry and is left out.

use std::collections::{BTreeSet, HashMap};

use crate::config::{ResolutionConfig, SolverConfig};
use crate::conflicts::PredictedDelays;
use crate::network::{FixedObligation, InputError, Instance, Network, TrainRequest};
use crate::schedule::{Schedule, ScheduleItem};
use crate::units::Time;
use crate::Id;

/// A self-contained sub-problem for re-solving.
#[derive(Debug, Clone)]
pub struct ReducedInstance {
    /// Touched sections only.
    pub network: Network,
    /// Remaining routes of the movable trains, released no earlier than
    /// their predicted start. Without slack absorption that is the
    /// scheduled entry of the remaining route pushed by the whole delay.
    pub trains: Vec<TrainRequest>,
    pub fixed: Vec<FixedObligation>,
    pub movable: BTreeSet<Id>,
    pub touched: BTreeSet<Id>,
    pub margin: Time,
}

impl ReducedInstance {
    pub fn instance(&self, config: &SolverConfig) -> Result<Instance<'_>, InputError> {
        Instance::with_fixed(&self.network, &self.trains, &self.fixed, config)
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }
}

/// Builds the reduced instance for the trains in `candidates`.
///
/// A candidate whose whole route is already committed is not movable.
pub fn reduce(
    network: &Network,
    trains: &[TrainRequest],
    schedule: &Schedule,
    candidates: &BTreeSet<Id>,
    delays: &PredictedDelays,
    config: &ResolutionConfig,
) -> Result<ReducedInstance, InputError> {
    let by_id: HashMap<&str, &TrainRequest> = trains.iter().map(|t| (t.id.as_str(), t)).collect();
    let committed = |item: &ScheduleItem| config.as_of.is_some_and(|t| item.entry_time < t);

    let mut reduced_trains = Vec::new();
    let mut movable = BTreeSet::new();
    let mut held: Vec<FixedObligation> = Vec::new();

    for id in candidates {
        let t = *by_id.get(id.as_str()).ok_or_else(|| InputError::UnknownTrain {
            field: format!("conflicts[{id}]"),
            id: id.clone(),
        })?;

        let mut prefix: Vec<FixedObligation> = Vec::new();
        let mut remaining: Vec<Id> = Vec::new();
        for section in &t.route_sections {
            match schedule.get(id, section) {
                Some(item) if remaining.is_empty() && committed(item) => {
                    prefix.push(FixedObligation::from_item(item, t.dwell_for(section)));
                }
                _ => remaining.push(section.clone()),
            }
        }
        let Some(next) = remaining.first() else {
            log::debug!("train {id} is fully committed and stays fixed");
            continue;
        };

        let delay = delays.seconds(id);
        let mut release = t.planned_departure + delay;
        if !config.detector.absorb_slack {
            if let Some(item) = schedule.get(id, next) {
                release = release.max(item.entry_time + delay);
            }
        }
        if let Some(as_of) = config.as_of {
            release = release.max(as_of);
        }
        if let Some(last) = prefix.last() {
            release = release.max(last.exit_time + t.dwell_for(next));
        }

        let dwell_before = t
            .dwell_before
            .iter()
            .filter(|(s, _)| remaining.contains(*s))
            .map(|(s, d)| (s.clone(), *d))
            .collect();
        reduced_trains.push(TrainRequest {
            id: id.clone(),
            priority: t.priority,
            planned_departure: release,
            route_sections: remaining,
            dwell_before,
            due_time: t.due_time,
        });
        movable.insert(id.clone());
        held.extend(prefix);
    }

    let mut touched = BTreeSet::new();
    for t in &reduced_trains {
        for (k, section) in t.route_sections.iter().enumerate() {
            let s = network
                .index_of(section)
                .ok_or_else(|| InputError::UnknownSection {
                    field: format!("trains[{}].route_sections[{k}]", t.id),
                    id: section.clone(),
                })?;
            touched.insert(section.clone());
            for (o, _) in network.linked(s) {
                touched.insert(network.section(o).id.clone());
            }
        }
    }

    let margin = config
        .interaction_margin
        .unwrap_or_else(|| derived_margin(network, &touched, &reduced_trains));
    let threshold = reduced_trains
        .iter()
        .map(|t| t.planned_departure)
        .min()
        .map_or(Time::MAX, |release| release - margin);

    let mut fixed: Vec<FixedObligation> = held
        .into_iter()
        .filter(|f| touched.contains(&f.section_id))
        .collect();
    for item in schedule.iter() {
        if movable.contains(&item.train_id)
            || !touched.contains(&item.section_id)
            || item.exit_time < threshold
        {
            continue;
        }
        let t = by_id
            .get(item.train_id.as_str())
            .ok_or_else(|| InputError::UnknownTrain {
                field: format!("schedule[{}]", item.train_id),
                id: item.train_id.clone(),
            })?;
        fixed.push(FixedObligation::from_item(item, t.dwell_for(&item.section_id)));
    }

    log::debug!(
        "reduced instance: {} movable trains, {} fixed obligations, {} of {} sections, margin {margin}s",
        movable.len(),
        fixed.len(),
        touched.len(),
        network.len()
    );

    Ok(ReducedInstance {
        network: network.restrict(&touched)?,
        trains: reduced_trains,
        fixed,
        movable,
        touched,
        margin,
    })
}

/// Largest headway plus clearance on a touched section, plus the largest
/// movable dwell: the furthest back an earlier exit can still constrain a
/// movable entry.
fn derived_margin(network: &Network, touched: &BTreeSet<Id>, movable: &[TrainRequest]) -> Time {
    let reach = touched
        .iter()
        .filter_map(|id| network.index_of(id))
        .map(|s| network.section(s).headway_seconds + network.max_clearance(s))
        .max()
        .unwrap_or(0);
    let dwell = movable
        .iter()
        .flat_map(|t| t.dwell_before.values().copied())
        .max()
        .unwrap_or(0);
    reach + dwell
}
