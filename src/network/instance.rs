//! A validated, indexed scheduling problem.
//!
//! [`Instance`] is what both schedulers consume: train requests resolved
//! to dense section indices, per-leg entry bounds, per-section forbidden
//! entry windows and any fixed obligations carried over from an existing
//! schedule. Building it performs every input check, so solvers never
//! see an unknown id or a negative duration.

use std::collections::HashSet;

use super::error::{non_negative, InputError};
use super::section::Section;
use super::topology::Network;
use super::train::TrainRequest;
use super::window::BlockWindows;
use crate::config::SolverConfig;
use crate::schedule::{Schedule, ScheduleItem};
use crate::units::Time;
use crate::Id;

/// One section of a train's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub section: usize,
    /// Minimum dwell before entry.
    pub dwell: Time,
    pub traverse: Time,
    /// Unconstrained earliest entry: release plus preceding traverses and dwells.
    pub earliest: Time,
    /// Latest admissible entry (`earliest` plus the effective horizon).
    pub latest: Time,
}

/// A train request resolved against a [`Network`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainPlan {
    pub id: Id,
    pub priority: u32,
    pub release: Time,
    pub due: Option<Time>,
    pub legs: Vec<Leg>,
}

/// Identifies a leg as (train index, position in route).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LegRef {
    pub train: usize,
    pub leg: usize,
}

/// An existing occupation that a solve must work around but may not move.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedObligation {
    pub train_id: Id,
    pub section_id: Id,
    pub entry_time: Time,
    pub exit_time: Time,
    /// Dwell the owning train observed before entry; counts toward
    /// platform capacity.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dwell: Time,
}

impl FixedObligation {
    pub fn from_item(item: &ScheduleItem, dwell: Time) -> Self {
        Self {
            train_id: item.train_id.clone(),
            section_id: item.section_id.clone(),
            entry_time: item.entry_time,
            exit_time: item.exit_time,
            dwell,
        }
    }
}

/// A fixed obligation resolved to a section index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixed {
    pub train_id: Id,
    pub section: usize,
    pub entry: Time,
    pub exit: Time,
    pub dwell: Time,
}

#[derive(Debug, Clone)]
pub struct Instance<'a> {
    network: &'a Network,
    trains: Vec<TrainPlan>,
    fixed: Vec<Fixed>,
    forbidden: Vec<BlockWindows>,
    max_dwell: Vec<Time>,
    legs_on: Vec<Vec<LegRef>>,
    fixed_on: Vec<Vec<usize>>,
    horizon: Time,
}

impl<'a> Instance<'a> {
    pub fn new(
        network: &'a Network,
        trains: &[TrainRequest],
        config: &SolverConfig,
    ) -> Result<Self, InputError> {
        Self::with_fixed(network, trains, &[], config)
    }

    /// Builds an instance whose trains must also respect `fixed`.
    pub fn with_fixed(
        network: &'a Network,
        trains: &[TrainRequest],
        fixed: &[FixedObligation],
        config: &SolverConfig,
    ) -> Result<Self, InputError> {
        let n = network.len();
        let mut plans = Vec::with_capacity(trains.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(trains.len());
        for (i, t) in trains.iter().enumerate() {
            if !seen.insert(t.id.as_str()) {
                return Err(InputError::DuplicateTrain {
                    field: format!("trains[{i}].id"),
                    id: t.id.clone(),
                });
            }
            plans.push(resolve_train(network, t)?);
        }

        let mut resolved = Vec::with_capacity(fixed.len());
        for (i, f) in fixed.iter().enumerate() {
            let section = network
                .index_of(&f.section_id)
                .ok_or_else(|| InputError::UnknownSection {
                    field: format!("fixed[{i}].section_id"),
                    id: f.section_id.clone(),
                })?;
            non_negative(|| format!("fixed[{i}].exit_time"), f.exit_time - f.entry_time)?;
            non_negative(|| format!("fixed[{i}].dwell"), f.dwell)?;
            resolved.push(Fixed {
                train_id: f.train_id.clone(),
                section,
                entry: f.entry_time,
                exit: f.exit_time,
                dwell: f.dwell,
            });
        }

        let mut max_dwell = vec![0; n];
        let mut legs_on = vec![Vec::new(); n];
        for (ti, plan) in plans.iter().enumerate() {
            for (li, leg) in plan.legs.iter().enumerate() {
                max_dwell[leg.section] = max_dwell[leg.section].max(leg.dwell);
                legs_on[leg.section].push(LegRef { train: ti, leg: li });
            }
        }
        let mut fixed_on = vec![Vec::new(); n];
        for (fi, f) in resolved.iter().enumerate() {
            max_dwell[f.section] = max_dwell[f.section].max(f.dwell);
            fixed_on[f.section].push(fi);
        }

        let forbidden = (0..n)
            .map(|s| {
                network
                    .block_windows(s)
                    .forbidden_entries(config.block_policy, network.section(s).traverse_seconds)
            })
            .collect();

        let horizon = effective_horizon(network, &plans, &resolved, &max_dwell, config);
        for plan in &mut plans {
            for leg in &mut plan.legs {
                leg.latest = leg.earliest.saturating_add(horizon);
            }
        }

        Ok(Self {
            network,
            trains: plans,
            fixed: resolved,
            forbidden,
            max_dwell,
            legs_on,
            fixed_on,
            horizon,
        })
    }

    pub fn network(&self) -> &'a Network {
        self.network
    }

    pub fn trains(&self) -> &[TrainPlan] {
        &self.trains
    }

    pub fn train(&self, idx: usize) -> &TrainPlan {
        &self.trains[idx]
    }

    pub fn leg(&self, r: LegRef) -> &Leg {
        &self.trains[r.train].legs[r.leg]
    }

    /// Legs of every train, in train then route order.
    pub fn legs(&self) -> impl Iterator<Item = (LegRef, &Leg)> + '_ {
        self.trains.iter().enumerate().flat_map(|(ti, plan)| {
            plan.legs
                .iter()
                .enumerate()
                .map(move |(li, leg)| (LegRef { train: ti, leg: li }, leg))
        })
    }

    pub fn leg_count(&self) -> usize {
        self.trains.iter().map(|p| p.legs.len()).sum()
    }

    pub fn fixed(&self) -> &[Fixed] {
        &self.fixed
    }

    pub fn section(&self, idx: usize) -> &Section {
        self.network.section(idx)
    }

    /// Instants at which entry into `section` is forbidden.
    pub fn forbidden(&self, section: usize) -> &BlockWindows {
        &self.forbidden[section]
    }

    pub fn max_dwell(&self, section: usize) -> Time {
        self.max_dwell[section]
    }

    pub fn legs_on(&self, section: usize) -> &[LegRef] {
        &self.legs_on[section]
    }

    pub fn fixed_on(&self, section: usize) -> &[usize] {
        &self.fixed_on[section]
    }

    /// Effective horizon: the slack every leg has past its `earliest`.
    pub fn horizon(&self) -> Time {
        self.horizon
    }

    /// True if the fixed obligation belongs to train `train`.
    pub fn same_train(&self, train: usize, fixed: &Fixed) -> bool {
        self.trains[train].id == fixed.train_id
    }

    /// True if any train carries a due time.
    pub fn has_due_times(&self) -> bool {
        self.trains.iter().any(|t| t.due.is_some())
    }

    /// Builds a schedule from per-train, per-leg entry times.
    pub fn to_schedule(&self, entries: &[Vec<Time>]) -> Schedule {
        let mut schedule = Schedule::new();
        for (plan, times) in self.trains.iter().zip(entries) {
            for (leg, &entry) in plan.legs.iter().zip(times) {
                schedule.upsert(ScheduleItem::new(
                    plan.id.clone(),
                    self.network.section(leg.section).id.clone(),
                    entry,
                    entry + leg.traverse,
                ));
            }
        }
        schedule
    }
}

fn resolve_train(network: &Network, t: &TrainRequest) -> Result<TrainPlan, InputError> {
    if t.priority == 0 {
        return Err(InputError::ZeroPriority {
            field: format!("trains[{}].priority", t.id),
        });
    }
    if t.route_sections.is_empty() {
        return Err(InputError::EmptyRoute {
            field: format!("trains[{}].route_sections", t.id),
        });
    }
    for (section, &dwell) in &t.dwell_before {
        let field = || format!("trains[{}].dwell_before[{section}]", t.id);
        if network.index_of(section).is_none() {
            return Err(InputError::UnknownSection {
                field: field(),
                id: section.clone(),
            });
        }
        non_negative(field, dwell)?;
    }

    let mut legs: Vec<Leg> = Vec::with_capacity(t.route_sections.len());
    let mut visited = HashSet::with_capacity(t.route_sections.len());
    for (k, id) in t.route_sections.iter().enumerate() {
        let field = || format!("trains[{}].route_sections[{k}]", t.id);
        let section = network.index_of(id).ok_or_else(|| InputError::UnknownSection {
            field: field(),
            id: id.clone(),
        })?;
        if !visited.insert(section) {
            return Err(InputError::RepeatedRouteSection {
                field: field(),
                id: id.clone(),
            });
        }
        let dwell = t.dwell_for(id);
        let earliest = match legs.last() {
            None => t.planned_departure,
            Some(prev) => prev.earliest + prev.traverse + dwell,
        };
        legs.push(Leg {
            section,
            dwell,
            traverse: network.section(section).traverse_seconds,
            earliest,
            latest: earliest,
        });
    }

    Ok(TrainPlan {
        id: t.id.clone(),
        priority: t.priority,
        release: t.planned_departure,
        due: t.due_time,
        legs,
    })
}

/// `max(horizon_seconds, L_max · Σ 2·(traverse + headway + max clearance + max dwell))`
/// over every leg and fixed obligation.
///
/// Each reservation can push a later leg back by at most its exclusion zone,
/// and delays accumulate along a route, so congestion alone never exhausts
/// this bound.
fn effective_horizon(
    network: &Network,
    plans: &[TrainPlan],
    fixed: &[Fixed],
    max_dwell: &[Time],
    config: &SolverConfig,
) -> Time {
    let zone = |s: usize| -> Time {
        let sec = network.section(s);
        2 * (sec.traverse_seconds + sec.headway_seconds + network.max_clearance(s) + max_dwell[s])
    };
    let total = plans
        .iter()
        .flat_map(|p| p.legs.iter().map(|l| l.section))
        .chain(fixed.iter().map(|f| f.section))
        .fold(0 as Time, |acc, s| acc.saturating_add(zone(s)));
    let longest = plans.iter().map(|p| p.legs.len()).max().unwrap_or(1) as Time;
    config.horizon_seconds.max(total.saturating_mul(longest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network::new(vec![
            Section::new("S1", 10, 100),
            Section::new("S2", 20, 50).conflicting_with("S1", 30),
            Section::new("S3", 0, 40).with_block_window(0, 10),
        ])
        .unwrap()
    }

    #[test]
    fn legs_carry_natural_earliest_entries() {
        let n = network();
        let t = TrainRequest::new("A", 1, 5, ["S1", "S2"]).with_dwell("S2", 60);
        let inst = Instance::new(&n, &[t], &SolverConfig::default()).unwrap();
        let plan = inst.train(0);
        assert_eq!(plan.legs[0].earliest, 5);
        assert_eq!(plan.legs[1].earliest, 5 + 100 + 60);
        assert_eq!(plan.legs[1].dwell, 60);
        assert_eq!(plan.legs[1].latest - plan.legs[1].earliest, inst.horizon());
        assert_eq!(inst.legs_on(1), &[LegRef { train: 0, leg: 1 }]);
    }

    #[test]
    fn horizon_never_below_configured_value() {
        let n = network();
        let t = TrainRequest::new("A", 1, 0, ["S3"]);
        let inst = Instance::new(&n, &[t], &SolverConfig::default()).unwrap();
        assert_eq!(inst.horizon(), 86_400);
    }

    #[test]
    fn horizon_grows_with_congestion() {
        let n = network();
        let trains: Vec<_> = (0..10)
            .map(|i| TrainRequest::new(format!("T{i}"), 1, 0, ["S1", "S2"]))
            .collect();
        let config = SolverConfig {
            horizon_seconds: 0,
            ..SolverConfig::default()
        };
        let inst = Instance::new(&n, &trains, &config).unwrap();
        // zone(S1) = 2·(100 + 10 + 30) = 280, zone(S2) = 2·(50 + 20 + 30) = 200
        assert_eq!(inst.horizon(), 2 * 10 * (280 + 200));
    }

    #[test]
    fn unknown_route_section_names_field() {
        let n = network();
        let t = TrainRequest::new("A", 1, 0, ["S1", "S9"]);
        let err = Instance::new(&n, &[t], &SolverConfig::default()).unwrap_err();
        assert_eq!(err.field(), "trains[A].route_sections[1]");
    }

    #[test]
    fn repeated_route_section_is_rejected() {
        let n = network();
        let t = TrainRequest::new("A", 1, 0, ["S1", "S2", "S1"]);
        let err = Instance::new(&n, &[t], &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, InputError::RepeatedRouteSection { .. }));
    }

    #[test]
    fn bad_train_fields_are_rejected() {
        let n = network();
        let cfg = SolverConfig::default();
        let dup = [
            TrainRequest::new("A", 1, 0, ["S1"]),
            TrainRequest::new("A", 1, 0, ["S2"]),
        ];
        assert!(matches!(
            Instance::new(&n, &dup, &cfg),
            Err(InputError::DuplicateTrain { .. })
        ));
        let zero = [TrainRequest::new("A", 0, 0, ["S1"])];
        assert!(matches!(
            Instance::new(&n, &zero, &cfg),
            Err(InputError::ZeroPriority { .. })
        ));
        let empty = [TrainRequest::new("A", 1, 0, Vec::<String>::new())];
        assert!(matches!(
            Instance::new(&n, &empty, &cfg),
            Err(InputError::EmptyRoute { .. })
        ));
        let dwell = [TrainRequest::new("A", 1, 0, ["S1"]).with_dwell("S1", -3)];
        assert_eq!(
            Instance::new(&n, &dwell, &cfg).unwrap_err().field(),
            "trains[A].dwell_before[S1]"
        );
    }

    #[test]
    fn fixed_obligations_are_indexed() {
        let n = network();
        let fixed = [FixedObligation {
            train_id: "X".to_string(),
            section_id: "S2".to_string(),
            entry_time: 0,
            exit_time: 50,
            dwell: 30,
        }];
        let t = TrainRequest::new("A", 1, 0, ["S1"]);
        let inst = Instance::with_fixed(&n, &[t], &fixed, &SolverConfig::default()).unwrap();
        assert_eq!(inst.fixed_on(1), &[0]);
        assert_eq!(inst.max_dwell(1), 30);
        assert!(!inst.same_train(0, &inst.fixed()[0]));
    }

    #[test]
    fn occupancy_policy_widens_forbidden_entries() {
        let n = network();
        let t = TrainRequest::new("A", 1, 0, ["S3"]);
        let config = SolverConfig {
            block_policy: crate::network::BlockPolicy::Occupancy,
            ..SolverConfig::default()
        };
        let inst = Instance::new(&n, &[t], &config).unwrap();
        assert!(inst.forbidden(2).contains(-39));
        assert!(!inst.forbidden(2).contains(-40));
    }

    #[test]
    fn to_schedule_uses_traverse() {
        let n = network();
        let t = TrainRequest::new("A", 1, 0, ["S1", "S2"]);
        let inst = Instance::new(&n, &[t], &SolverConfig::default()).unwrap();
        let s = inst.to_schedule(&[vec![0, 130]]);
        let item = s.get("A", "S2").unwrap();
        assert_eq!((item.entry_time, item.exit_time), (130, 180));
    }
}
