//! Conflict detection over predicted entry times.

use std::collections::{BTreeMap, HashMap};

use crate::config::{DetectorConfig, SolverConfig};
use crate::network::{ClearanceSource, InputError, Instance, Network, TrainRequest};
use crate::schedule::Schedule;
use crate::units::Time;
use crate::Id;

use super::record::{ConflictRecord, ConflictResource, PredictedDelays, Severity};

/// One predicted occupation of a section.
#[derive(Debug, Clone, Copy)]
struct Occupation<'a> {
    train: &'a str,
    entry: Time,
    exit: Time,
}

/// Flags every pair of trains whose predicted use of a section, or of two
/// clearance-linked sections, falls short of the required gap.
///
/// Only items whose predicted entry lies in the detector's near-term
/// window take part. Records come out ordered by earliest predicted entry.
pub fn detect_conflicts(
    network: &Network,
    trains: &[TrainRequest],
    schedule: &Schedule,
    delays: &PredictedDelays,
    config: &DetectorConfig,
) -> Result<Vec<ConflictRecord>, InputError> {
    let departures: HashMap<&str, Time> = trains
        .iter()
        .map(|t| (t.id.as_str(), t.planned_departure))
        .collect();

    let mut on: Vec<Vec<Occupation<'_>>> = vec![Vec::new(); network.len()];
    for train in schedule.train_ids() {
        let departure = *departures.get(train).ok_or_else(|| InputError::UnknownTrain {
            field: format!("schedule[{train}]"),
            id: train.to_string(),
        })?;
        let first = schedule.first_entry(train).unwrap_or(departure);
        let shift = config.shift(first, departure, delays.seconds(train));
        for item in schedule.train_items(train) {
            let s = network
                .index_of(&item.section_id)
                .ok_or_else(|| InputError::UnknownSection {
                    field: format!("schedule[{train}].section_id"),
                    id: item.section_id.clone(),
                })?;
            let entry = item.entry_time + shift;
            if config.in_window(entry) {
                on[s].push(Occupation {
                    train,
                    entry,
                    exit: item.exit_time + shift,
                });
            }
        }
    }
    for occupations in &mut on {
        occupations.sort_by_key(|o| (o.entry, o.train));
    }

    let mut found = Found::default();
    for (s, occupations) in on.iter().enumerate() {
        let section = network.section(s);
        let headway = section.headway_seconds;
        for (i, early) in occupations.iter().enumerate() {
            for late in &occupations[i + 1..] {
                let gap = late.entry - early.exit;
                if gap >= headway {
                    break;
                }
                if early.train == late.train {
                    continue;
                }
                found.add(
                    early,
                    late,
                    ConflictResource::Section {
                        section: section.id.clone(),
                    },
                    gap,
                    headway,
                    gap < 0,
                );
            }
        }

        for (o, clearance) in network.linked(s) {
            if o < s {
                continue;
            }
            let (id_s, id_o) = (&section.id, &network.section(o).id);
            let (a, b) = if id_s <= id_o {
                (id_s.clone(), id_o.clone())
            } else {
                (id_o.clone(), id_s.clone())
            };
            let resource = match &clearance.source {
                ClearanceSource::Link => ConflictResource::Link { a, b },
                ClearanceSource::Group(group) => ConflictResource::Group {
                    group: group.clone(),
                    a,
                    b,
                },
            };
            for x in occupations {
                for y in on[o].iter().filter(|y| y.train != x.train) {
                    let gap = (x.entry - y.entry).abs();
                    if gap < clearance.seconds {
                        let (early, late) = if (x.entry, x.train) <= (y.entry, y.train) {
                            (x, y)
                        } else {
                            (y, x)
                        };
                        found.add(early, late, resource.clone(), gap, clearance.seconds, gap == 0);
                    }
                }
            }
        }
    }

    let mut records = found.into_records();
    records.sort_by(|a, b| {
        (a.starts_at(), &a.train_a, &a.train_b, &a.resource).cmp(&(
            b.starts_at(),
            &b.train_a,
            &b.train_b,
            &b.resource,
        ))
    });
    log::debug!(
        "detected {} conflicts among {} trains",
        records.len(),
        schedule.train_count()
    );
    Ok(records)
}

/// Detects on planned routes, each train at its unconstrained nominal
/// timing, for when no schedule exists yet.
pub fn detect_planned(
    network: &Network,
    trains: &[TrainRequest],
    delays: &PredictedDelays,
    config: &DetectorConfig,
) -> Result<Vec<ConflictRecord>, InputError> {
    let schedule = nominal_schedule(network, trains)?;
    detect_conflicts(network, trains, &schedule, delays, config)
}

/// Every train at its earliest entries, ignoring all other trains.
pub fn nominal_schedule(network: &Network, trains: &[TrainRequest]) -> Result<Schedule, InputError> {
    let instance = Instance::new(network, trains, &SolverConfig::default())?;
    let entries: Vec<Vec<Time>> = instance
        .trains()
        .iter()
        .map(|plan| plan.legs.iter().map(|leg| leg.earliest).collect())
        .collect();
    Ok(instance.to_schedule(&entries))
}

/// One record per train pair and resource, keeping the worst shortfall.
#[derive(Default)]
struct Found(BTreeMap<(Id, Id, ConflictResource), ConflictRecord>);

impl Found {
    fn add(
        &mut self,
        early: &Occupation<'_>,
        late: &Occupation<'_>,
        resource: ConflictResource,
        gap: Time,
        required: Time,
        coincide: bool,
    ) {
        let record = ConflictRecord {
            train_a: early.train.to_string(),
            train_b: late.train.to_string(),
            resource,
            severity: Severity::grade(required - gap, required, coincide),
            entry_a: early.entry,
            entry_b: late.entry,
            gap,
            required,
        };
        let (lo, hi) = if early.train <= late.train {
            (early.train, late.train)
        } else {
            (late.train, early.train)
        };
        let key = (lo.to_string(), hi.to_string(), record.resource.clone());
        match self.0.get(&key) {
            Some(kept) if kept.shortfall() >= record.shortfall() => {}
            _ => {
                self.0.insert(key, record);
            }
        }
    }

    fn into_records(self) -> Vec<ConflictRecord> {
        self.0.into_values().collect()
    }
}
