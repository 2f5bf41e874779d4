//! Punctuality metrics derived from a schedule.
//!
//! [`evaluate`] is a pure function of its inputs. Lateness is reported in
//! seconds per train and summarized in minutes.

use std::collections::BTreeMap;

use qtty::{Minute, Quantity};

use crate::network::TrainRequest;
use crate::schedule::Schedule;
use crate::units::{time_to_minutes, Time};
use crate::Id;

/// Lateness of one train against its due time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainLateness {
    pub due: Time,
    pub exit: Time,
    /// `max(0, exit - due)`.
    pub lateness: Time,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KpiReport {
    /// Trains with a due time that appear in the schedule.
    pub lateness: BTreeMap<Id, TrainLateness>,
    pub tolerance: Time,
    /// Trains whose lateness is within the tolerance.
    pub on_time: usize,
    /// On-time performance in percent; 100 when no train has a due time.
    pub otp_percent: f64,
    pub total_lateness: Time,
    pub max_lateness: Time,
    /// Mean lateness in seconds over trains with a due time.
    pub avg_lateness_seconds: f64,
    /// Distinct trains in the schedule.
    pub total_trains: usize,
    /// Latest exit minus earliest entry.
    pub makespan: Time,
    /// Occupied time over makespan, per section.
    pub utilization: BTreeMap<Id, f64>,
}

impl KpiReport {
    pub fn avg_lateness_minutes(&self) -> Quantity<Minute> {
        time_to_minutes(self.avg_lateness_seconds)
    }

    pub fn late_trains(&self) -> impl Iterator<Item = &str> + '_ {
        self.lateness
            .iter()
            .filter(|(_, l)| l.lateness > 0)
            .map(|(id, _)| id.as_str())
    }
}

/// Computes lateness, OTP at `tolerance`, summary figures and per-section
/// utilization.
pub fn evaluate(schedule: &Schedule, trains: &[TrainRequest], tolerance: Time) -> KpiReport {
    let mut lateness = BTreeMap::new();
    for t in trains {
        let (Some(due), Some(exit)) = (t.due_time, schedule.last_exit(&t.id)) else {
            continue;
        };
        lateness.insert(
            t.id.clone(),
            TrainLateness {
                due,
                exit,
                lateness: (exit - due).max(0),
            },
        );
    }

    let on_time = lateness.values().filter(|l| l.lateness <= tolerance).count();
    let total_lateness: Time = lateness.values().map(|l| l.lateness).sum();
    let max_lateness = lateness.values().map(|l| l.lateness).max().unwrap_or(0);
    let (otp_percent, avg_lateness_seconds) = if lateness.is_empty() {
        (100.0, 0.0)
    } else {
        let n = lateness.len() as f64;
        (100.0 * on_time as f64 / n, total_lateness as f64 / n)
    };

    let makespan = schedule.makespan().unwrap_or(0);
    let utilization = schedule
        .section_ids()
        .map(|s| {
            let u = if makespan > 0 {
                schedule.occupied_time(s) as f64 / makespan as f64
            } else {
                0.0
            };
            (s.to_string(), u)
        })
        .collect();

    KpiReport {
        lateness,
        tolerance,
        on_time,
        otp_percent,
        total_lateness,
        max_lateness,
        avg_lateness_seconds,
        total_trains: schedule.train_count(),
        makespan,
        utilization,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleItem;

    fn fixture() -> (Schedule, Vec<TrainRequest>) {
        let s = Schedule::from_items([
            ScheduleItem::new("A", "S1", 0, 100),
            ScheduleItem::new("A", "S2", 100, 200),
            ScheduleItem::new("B", "S1", 220, 320),
            ScheduleItem::new("C", "S2", 300, 400),
        ])
        .unwrap();
        let t = vec![
            TrainRequest::new("A", 1, 0, ["S1", "S2"]).due_at(200),
            TrainRequest::new("B", 1, 0, ["S1"]).due_at(200),
            TrainRequest::new("C", 1, 0, ["S2"]),
        ];
        (s, t)
    }

    #[test]
    fn lateness_is_clipped_at_zero() {
        let (s, t) = fixture();
        let k = evaluate(&s, &t, 0);
        assert_eq!(k.lateness["A"].lateness, 0);
        assert_eq!(k.lateness["B"].lateness, 120);
        assert!(!k.lateness.contains_key("C"));
        assert_eq!(k.total_lateness, 120);
        assert_eq!(k.max_lateness, 120);
        assert!((k.avg_lateness_minutes().value() - 1.0).abs() < 1e-12);
        assert_eq!(k.late_trains().collect::<Vec<_>>(), ["B"]);
    }

    #[test]
    fn otp_follows_tolerance() {
        let (s, t) = fixture();
        assert!((evaluate(&s, &t, 0).otp_percent - 50.0).abs() < 1e-9);
        assert!((evaluate(&s, &t, 120).otp_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn otp_is_monotone_in_tolerance() {
        let (s, t) = fixture();
        let mut last = f64::INFINITY;
        for tol in (0..=200).rev().step_by(10) {
            let otp = evaluate(&s, &t, tol).otp_percent;
            assert!(otp <= last);
            last = otp;
        }
    }

    #[test]
    fn summary_and_utilization() {
        let (s, t) = fixture();
        let k = evaluate(&s, &t, 0);
        assert_eq!(k.total_trains, 3);
        assert_eq!(k.makespan, 400);
        assert!((k.utilization["S1"] - 0.5).abs() < 1e-12);
        assert!((k.utilization["S2"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_schedule() {
        let k = evaluate(&Schedule::new(), &[], 0);
        assert_eq!(k.otp_percent, 100.0);
        assert_eq!(k.makespan, 0);
        assert!(k.utilization.is_empty());
    }
}
