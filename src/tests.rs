//! End-to-end scenarios and schedule properties across both schedulers.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::algorithms::{
    solve, solve_instance, ConstraintKind, ObjectiveHint, Solution, SolveError, SolveStatus,
    SolverChoice,
};
use crate::config::{DetectorConfig, ResolutionConfig, SolverConfig};
use crate::conflicts::{detect_conflicts, PredictedDelays};
use crate::kpi;
use crate::network::{BlockPolicy, FixedObligation, Instance, Network, Section, TrainRequest};
use crate::resolution::{resolve, run_cycle, CycleOutcome, FixedDelays, LiveSchedule};
use crate::schedule::{verify, Schedule, ScheduleItem};

const CHOICES: [SolverChoice; 2] = [SolverChoice::Heuristic, SolverChoice::Optimizer];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn assert_valid(n: &Network, t: &[TrainRequest], s: &Schedule) {
    let violations = verify(n, t, s, BlockPolicy::EntryOnly);
    assert!(violations.is_empty(), "violations: {violations:?}");
}

/// Solves with `choice` and checks the result against every constraint.
fn solved(n: &Network, t: &[TrainRequest], choice: SolverChoice, config: &SolverConfig) -> Solution {
    let sol = solve(n, t, choice, ObjectiveHint::Auto, config)
        .unwrap_or_else(|e| panic!("{choice:?} failed: {e}"));
    assert_valid(n, t, &sol.schedule);
    sol
}

/// Detects on `planned`, resolves with every solver and checks each result.
fn resolves_cleanly(n: &Network, t: &[TrainRequest], planned: &Schedule) -> Vec<Schedule> {
    let conflicts =
        detect_conflicts(n, t, planned, &PredictedDelays::new(), &DetectorConfig::default()).unwrap();
    assert!(!conflicts.is_empty());
    CHOICES
        .into_iter()
        .map(|choice| {
            let config = ResolutionConfig {
                solver: choice,
                ..ResolutionConfig::default()
            };
            let merged = resolve(n, t, planned, &conflicts, &config)
                .unwrap_or_else(|e| panic!("{choice:?}: {e}"));
            assert_valid(n, t, &merged);
            merged
        })
        .collect()
}

mod scenarios {
    use super::*;

    fn scenario_a() -> (Network, Vec<TrainRequest>) {
        (
            Network::new(vec![Section::new("S1", 120, 100)]).unwrap(),
            vec![
                TrainRequest::new("A", 1, 0, ["S1"]).due_at(400),
                TrainRequest::new("B", 1, 0, ["S1"]).due_at(200),
            ],
        )
    }

    #[test]
    fn scenario_a_urgent_train_goes_first() {
        init_logger();
        let (n, t) = scenario_a();
        let heuristic = solved(&n, &t, SolverChoice::Heuristic, &SolverConfig::default());
        assert_eq!(heuristic.status, SolveStatus::Feasible);

        let sol = solved(&n, &t, SolverChoice::Optimizer, &SolverConfig::default());
        assert_eq!(sol.status, SolveStatus::Optimal);
        let b = sol.schedule.get("B", "S1").unwrap();
        let a = sol.schedule.get("A", "S1").unwrap();
        assert_eq!((b.entry_time, b.exit_time), (0, 100));
        assert!(a.entry_time >= 120);

        let report = kpi::evaluate(&sol.schedule, &t, 0);
        assert_eq!(report.total_lateness, 0);
        assert_eq!(report.on_time, 2);
    }

    /// Four trains asking for S1 within less than one headway.
    fn scenario_b() -> (Network, Vec<TrainRequest>, Schedule) {
        let n = Network::new(vec![
            Section::new("S1", 120, 60),
            Section::new("S2", 30, 40),
        ])
        .unwrap();
        let t: Vec<_> = ["A", "B", "C", "D"]
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let depart = 20 * i as i64;
                TrainRequest::new(id, 1, depart, ["S1", "S2"]).due_at(depart + 600)
            })
            .collect();
        let planned = Schedule::from_items(t.iter().flat_map(|r| {
            let d = r.planned_departure;
            [
                ScheduleItem::new(r.id.clone(), "S1", d, d + 60),
                ScheduleItem::new(r.id.clone(), "S2", d + 60, d + 100),
            ]
        }))
        .unwrap();
        (n, t, planned)
    }

    #[test]
    fn scenario_b_conflicts_are_detected_and_resolved() {
        init_logger();
        let (n, t, planned) = scenario_b();
        resolves_cleanly(&n, &t, &planned);
    }

    #[test]
    fn scenario_b_control_cycle_commits_a_clean_schedule() {
        let (n, t, planned) = scenario_b();
        let live = LiveSchedule::new(planned);
        let report = run_cycle(
            &live,
            &n,
            &t,
            &FixedDelays::default(),
            None,
            &ResolutionConfig::default(),
        )
        .unwrap();
        assert!(report.detected > 0);
        assert!(report.remaining.is_empty());
        assert_eq!(report.outcome, CycleOutcome::Committed { version: 1 });
        assert_valid(&n, &t, &live.snapshot().1);
    }

    #[test]
    fn scenario_c_permanent_block_is_infeasible_for_both() {
        let n = Network::new(vec![
            Section::new("S1", 60, 100).with_block_window(-1_000_000_000, 1_000_000_000),
        ])
        .unwrap();
        let t = [TrainRequest::new("A", 1, 0, ["S1"]).due_at(500)];
        for choice in CHOICES {
            let err = solve(&n, &t, choice, ObjectiveHint::Auto, &SolverConfig::default())
                .unwrap_err();
            let SolveError::Infeasible(inf) = err else {
                panic!("{choice:?}: expected infeasibility, got {err:?}");
            };
            assert!(inf.involves("A"));
            assert!(inf.has_kind(ConstraintKind::BlockWindow));
        }
    }

    /// X and Y dwell on a two-slot platform over [0, 60). A needs the
    /// platform after a shared section on which it clashes with B, so its
    /// re-solved dwell must stay clear of the full slots.
    #[test]
    fn resolve_keeps_a_full_platform_within_capacity() {
        init_logger();
        let n = Network::new(vec![
            Section::new("S", 30, 10),
            Section::new("P", 0, 0).with_platform_capacity(2),
        ])
        .unwrap();
        let t = vec![
            TrainRequest::new("A", 1, 0, ["S", "P"]).with_dwell("P", 60),
            TrainRequest::new("B", 1, 0, ["S"]),
            TrainRequest::new("X", 1, 0, ["P"]).with_dwell("P", 60),
            TrainRequest::new("Y", 1, 0, ["P"]).with_dwell("P", 60),
        ];
        let planned = Schedule::from_items([
            ScheduleItem::new("B", "S", 0, 10),
            ScheduleItem::new("A", "S", 20, 30),
            ScheduleItem::new("A", "P", 120, 120),
            ScheduleItem::new("X", "P", 60, 60),
            ScheduleItem::new("Y", "P", 60, 60),
        ])
        .unwrap();

        for merged in resolves_cleanly(&n, &t, &planned) {
            assert!(merged.get("A", "P").unwrap().entry_time - 60 >= 60);
            assert_eq!(merged.get("X", "P"), planned.get("X", "P"));
            assert_eq!(merged.get("Y", "P"), planned.get("Y", "P"));
        }
    }
}

mod properties {
    use super::*;

    /// Two linked junction sections, a grouped pair and a platform.
    fn network() -> Network {
        Network::new(vec![
            Section::new("P", 30, 60).with_platform_capacity(1),
            Section::new("J1", 60, 30).conflicting_with("J2", 45),
            Section::new("J2", 60, 30),
            Section::new("X1", 20, 20).in_group("X", 50),
            Section::new("X2", 20, 20).in_group("X", 30),
        ])
        .unwrap()
    }

    fn trains() -> Vec<TrainRequest> {
        vec![
            TrainRequest::new("A", 2, 0, ["P", "J1", "X1"])
                .with_dwell("P", 40)
                .due_at(300),
            TrainRequest::new("B", 1, 10, ["P", "J2", "X2"])
                .with_dwell("P", 40)
                .with_dwell("J2", 15)
                .due_at(250),
            TrainRequest::new("C", 3, 0, ["J2", "X1"]).due_at(200),
        ]
    }

    fn entry(s: &Schedule, train: &str, section: &str) -> i64 {
        s.get(train, section).unwrap().entry_time
    }

    #[test]
    fn every_invariant_holds_for_both_schedulers() {
        let (n, t) = (network(), trains());
        for choice in CHOICES {
            let sol = solved(&n, &t, choice, &SolverConfig::default());
            let s = &sol.schedule;

            // Route order and dwell.
            assert!(entry(s, "B", "J2") >= s.get("B", "P").unwrap().exit_time + 15);
            // Platform: pre-entry dwells of A and B do not overlap.
            let (a, b) = (entry(s, "A", "P"), entry(s, "B", "P"));
            assert!(a <= b - 40 || b <= a - 40);
            // Linked junctions and the group's larger clearance.
            for other in ["B", "C"] {
                assert!((entry(s, "A", "J1") - entry(s, other, "J2")).abs() >= 45);
            }
            assert!((entry(s, "B", "X2") - entry(s, "A", "X1")).abs() >= 50);
            assert!((entry(s, "B", "X2") - entry(s, "C", "X1")).abs() >= 50);
        }
    }

    #[test]
    fn resolving_nothing_is_identity_and_otp_is_monotone() {
        let (n, t) = (network(), trains());
        let sol = solved(&n, &t, SolverChoice::Heuristic, &SolverConfig::default());
        let out = resolve(&n, &t, &sol.schedule, &[], &ResolutionConfig::default()).unwrap();
        assert_eq!(out, sol.schedule);

        let mut previous = usize::MAX;
        for tolerance in [600, 300, 120, 60, 0] {
            let report = kpi::evaluate(&sol.schedule, &t, tolerance);
            assert!(report.on_time <= previous);
            for l in report.lateness.values() {
                assert_eq!(l.lateness, (l.exit - l.due).max(0));
            }
            previous = report.on_time;
        }
    }

    #[test]
    fn optimizer_is_never_worse_than_the_heuristic() {
        let (n, t) = (network(), trains());
        let cfg = SolverConfig::default();
        let heuristic = solved(&n, &t, SolverChoice::Heuristic, &cfg);
        let optimizer = solved(&n, &t, SolverChoice::Optimizer, &cfg);
        assert!(optimizer.cost.total_cmp(&heuristic.cost).is_le());
    }
}

mod randomized {
    use super::*;

    const SECTIONS: [&str; 4] = ["S0", "S1", "S2", "S3"];

    fn random_network(rng: &mut StdRng) -> Network {
        let mut sections: Vec<Section> = SECTIONS
            .iter()
            .map(|id| Section::new(*id, rng.gen_range(0..90), rng.gen_range(10..80)))
            .collect();
        if rng.gen_bool(0.5) {
            sections[0] = sections[0].clone().conflicting_with("S1", rng.gen_range(10..60));
        }
        if rng.gen_bool(0.5) {
            let c = rng.gen_range(10..60);
            sections[2] = sections[2].clone().in_group("G", c);
            sections[3] = sections[3].clone().in_group("G", c);
        }
        if rng.gen_bool(0.5) {
            let cap = rng.gen_range(1..3);
            sections[1] = sections[1].clone().with_platform_capacity(cap);
        }
        Network::new(sections).unwrap()
    }

    fn random_trains(rng: &mut StdRng) -> Vec<TrainRequest> {
        let count = rng.gen_range(2..5);
        (0..count)
            .map(|i| {
                let mut route: Vec<&str> =
                    SECTIONS.iter().copied().filter(|_| rng.gen_bool(0.6)).collect();
                if route.is_empty() {
                    route.push(SECTIONS[i % SECTIONS.len()]);
                }
                let depart = rng.gen_range(0..200);
                let mut train = TrainRequest::new(format!("T{i}"), rng.gen_range(1..4), depart, route.clone());
                for section in route {
                    if rng.gen_bool(0.3) {
                        train = train.with_dwell(section, rng.gen_range(5..40));
                    }
                }
                if rng.gen_bool(0.7) {
                    train = train.due_at(depart + rng.gen_range(100..500));
                }
                train
            })
            .collect()
    }

    #[test]
    fn random_instances_solve_to_valid_schedules() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(0x7a11);
        let config = SolverConfig {
            time_budget: Duration::from_secs(2),
            node_limit: Some(2_000),
            ..SolverConfig::default()
        };
        for round in 0..40 {
            let n = random_network(&mut rng);
            let t = random_trains(&mut rng);
            let heuristic = solved(&n, &t, SolverChoice::Heuristic, &config);
            let optimizer = solved(&n, &t, SolverChoice::Optimizer, &config);
            assert!(
                optimizer.cost.total_cmp(&heuristic.cost).is_le(),
                "round {round}: {:?} > {:?}",
                optimizer.cost,
                heuristic.cost
            );
        }
    }

    #[test]
    fn random_delays_are_absorbed_by_resolution() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = ResolutionConfig {
            solver_config: SolverConfig {
                node_limit: Some(2_000),
                ..SolverConfig::default()
            },
            ..ResolutionConfig::default()
        };
        for round in 0..20 {
            let n = random_network(&mut rng);
            let t = random_trains(&mut rng);
            let base = solve(&n, &t, SolverChoice::Heuristic, ObjectiveHint::Auto, &config.solver_config)
                .unwrap()
                .schedule;
            let delays: PredictedDelays = t
                .iter()
                .filter_map(|r| {
                    rng.gen_bool(0.5)
                        .then(|| (r.id.clone(), rng.gen_range(0.5..4.0)))
                })
                .collect();

            let live = LiveSchedule::new(base);
            let report = run_cycle(&live, &n, &t, &FixedDelays(delays), None, &config)
                .unwrap_or_else(|e| panic!("round {round}: {e}"));
            // Moving one train can push it onto another delayed train, which
            // the next round then picks up.
            assert!(
                report.remaining.is_empty() || report.rounds == config.max_rounds,
                "round {round}: {:?}",
                report.remaining
            );
            assert_valid(&n, &t, &live.snapshot().1);
        }
    }

    /// Up to two fixed dwellers on a two-slot platform, with movable trains
    /// dwelling there too.
    #[test]
    fn random_fixed_dwellers_on_a_two_slot_platform() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(0xd3e1);
        let config = SolverConfig {
            node_limit: Some(2_000),
            ..SolverConfig::default()
        };
        for round in 0..30 {
            let n = Network::new(vec![
                Section::new("S", rng.gen_range(0..40), rng.gen_range(10..40)),
                Section::new("P", 0, 0).with_platform_capacity(2),
            ])
            .unwrap();
            let fixed: Vec<FixedObligation> = (0..rng.gen_range(0..=2))
                .map(|i| {
                    let entry = rng.gen_range(60..300);
                    FixedObligation {
                        train_id: format!("X{i}"),
                        section_id: "P".into(),
                        entry_time: entry,
                        exit_time: entry,
                        dwell: rng.gen_range(30..90),
                    }
                })
                .collect();
            let t: Vec<TrainRequest> = (0..rng.gen_range(1..4))
                .map(|i| {
                    let route = if rng.gen_bool(0.5) { vec!["S", "P"] } else { vec!["P"] };
                    TrainRequest::new(format!("T{i}"), 1, rng.gen_range(0..200), route)
                        .with_dwell("P", rng.gen_range(20..80))
                })
                .collect();
            let instance = Instance::with_fixed(&n, &t, &fixed, &config).unwrap();

            // Check each result together with the fixed dwellers.
            let mut everyone = t.clone();
            everyone.extend(fixed.iter().map(|f| {
                TrainRequest::new(f.train_id.clone(), 1, 0, ["P"]).with_dwell("P", f.dwell)
            }));
            for choice in CHOICES {
                let sol = solve_instance(&instance, choice, ObjectiveHint::Auto, &config)
                    .unwrap_or_else(|e| panic!("round {round}: {choice:?} failed: {e}"));
                let mut items: Vec<ScheduleItem> = sol.schedule.iter().cloned().collect();
                items.extend(fixed.iter().map(|f| {
                    ScheduleItem::new(f.train_id.clone(), "P", f.entry_time, f.exit_time)
                }));
                let full = Schedule::from_items(items).unwrap();
                assert_valid(&n, &everyone, &full);
            }
        }
    }
}
