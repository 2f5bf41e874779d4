//! The PREDICT → DETECT → RESOLVE → MERGE → REASSESS control cycle.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ResolutionConfig;
use crate::conflicts::{detect_conflicts, ConflictRecord, PredictedDelays};
use crate::kpi;
use crate::network::{Network, TrainRequest};
use crate::schedule::Schedule;
use crate::{generate_id, Id};

use super::audit::{AuditEvent, AuditKind, AuditSink};
use super::live::{CommitOutcome, LiveSchedule, Ticket};
use super::orchestrator::{resolve_with_delays, ResolveError};
use super::predictor::{PredictError, Predictor};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CycleError {
    #[error(transparent)]
    Prediction(#[from] PredictError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Detection found nothing; the live schedule was left alone.
    NoConflicts,
    Committed { version: u64 },
    /// A newer cycle or commit overtook this one; its result was dropped.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// UUID v4 of the cycle.
    pub run_id: Id,
    pub base_version: u64,
    pub outcome: CycleOutcome,
    /// Conflicts found on the schedule the cycle read.
    pub detected: usize,
    /// Resolve rounds performed.
    pub rounds: u32,
    /// Conflicts still predicted after the last round.
    pub remaining: Vec<ConflictRecord>,
}

/// Everything a cycle consults besides the live schedule.
pub struct ControlCycle<'a> {
    pub network: &'a Network,
    pub trains: &'a [TrainRequest],
    pub predictor: &'a dyn Predictor,
    pub audit: Option<&'a dyn AuditSink>,
    pub config: &'a ResolutionConfig,
}

impl ControlCycle<'_> {
    fn detect(
        &self,
        schedule: &Schedule,
        delays: &PredictedDelays,
    ) -> Result<Vec<ConflictRecord>, ResolveError> {
        Ok(detect_conflicts(
            self.network,
            self.trains,
            schedule,
            delays,
            &self.config.detector,
        )?)
    }

    /// Runs one cycle against `live`.
    ///
    /// Predictions are read against the live schedule the cycle starts
    /// from. A cycle that finds no conflicts changes nothing, so repeating
    /// it is harmless.
    pub fn run(&self, live: &LiveSchedule) -> Result<CycleReport, CycleError> {
        let (ticket, base) = live.begin_cycle();
        self.run_from(live, ticket, base)
    }

    /// Runs a cycle whose ticket was taken earlier, e.g. when it was queued.
    pub fn run_from(
        &self,
        live: &LiveSchedule,
        ticket: Ticket,
        base: Arc<Schedule>,
    ) -> Result<CycleReport, CycleError> {
        let run_id = generate_id();
        let mut delays = self.predictor.predict(self.network, self.trains, &base)?;

        let mut conflicts = self.detect(&base, &delays)?;
        let detected = conflicts.len();
        let mut report = CycleReport {
            run_id,
            base_version: ticket.base_version(),
            outcome: CycleOutcome::NoConflicts,
            detected,
            rounds: 0,
            remaining: Vec::new(),
        };
        if conflicts.is_empty() {
            log::debug!("cycle {}: no conflicts at v{}", report.run_id, report.base_version);
            return Ok(report);
        }

        let mut current = (*base).clone();
        while !conflicts.is_empty() && report.rounds < self.config.max_rounds {
            if !live.is_current(&ticket) {
                break;
            }
            let resolution = resolve_with_delays(
                self.network,
                self.trains,
                &current,
                &conflicts,
                &delays,
                self.config,
            )?;
            delays = resolution.outstanding(&delays, self.config);
            current = resolution.schedule;
            report.rounds += 1;
            conflicts = self.detect(&current, &delays)?;
        }
        report.remaining = conflicts;

        report.outcome = self.commit(live, &ticket, current, &report);
        Ok(report)
    }

    fn commit(
        &self,
        live: &LiveSchedule,
        ticket: &Ticket,
        schedule: Schedule,
        report: &CycleReport,
    ) -> CycleOutcome {
        let audit_copy = self.audit.map(|_| schedule.clone());
        let (outcome, kind, version) = match live.commit(ticket, schedule) {
            CommitOutcome::Committed { version } => {
                log::info!(
                    "cycle {} committed v{version}: {} conflicts, {} rounds, {} remaining",
                    report.run_id,
                    report.detected,
                    report.rounds,
                    report.remaining.len()
                );
                (CycleOutcome::Committed { version }, AuditKind::Resolved, version)
            }
            CommitOutcome::Superseded { .. } => (
                CycleOutcome::Superseded,
                AuditKind::Superseded,
                ticket.base_version(),
            ),
        };
        if let (Some(sink), Some(schedule)) = (self.audit, audit_copy) {
            let kpis = kpi::evaluate(&schedule, self.trains, self.config.kpi_tolerance);
            sink.record(AuditEvent {
                run_id: report.run_id.clone(),
                kind,
                version,
                conflicts: report.detected,
                schedule: Arc::new(schedule),
                kpis,
            });
        }
        outcome
    }
}

/// Owned inputs of a control cycle, for running it on a worker pool.
pub struct CycleRequest {
    pub network: Network,
    pub trains: Vec<TrainRequest>,
    pub predictor: Arc<dyn Predictor>,
    pub audit: Option<Arc<dyn AuditSink>>,
    pub config: ResolutionConfig,
}

impl CycleRequest {
    pub fn cycle(&self) -> ControlCycle<'_> {
        ControlCycle {
            network: &self.network,
            trains: &self.trains,
            predictor: self.predictor.as_ref(),
            audit: self.audit.as_deref(),
            config: &self.config,
        }
    }
}

impl std::fmt::Debug for CycleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleRequest")
            .field("sections", &self.network.len())
            .field("trains", &self.trains.len())
            .field("audited", &self.audit.is_some())
            .finish()
    }
}

/// Runs one control cycle; see [`ControlCycle::run`].
pub fn run_cycle(
    live: &LiveSchedule,
    network: &Network,
    trains: &[TrainRequest],
    predictor: &dyn Predictor,
    audit: Option<&dyn AuditSink>,
    config: &ResolutionConfig,
) -> Result<CycleReport, CycleError> {
    ControlCycle {
        network,
        trains,
        predictor,
        audit,
        config,
    }
    .run(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{BlockPolicy, Section};
    use crate::resolution::audit::MemoryAudit;
    use crate::resolution::predictor::FixedDelays;
    use crate::schedule::{verify, ScheduleItem};

    fn network() -> Network {
        Network::new(vec![Section::new("S1", 120, 100)]).unwrap()
    }

    fn trains() -> Vec<TrainRequest> {
        vec![
            TrainRequest::new("A", 1, 0, ["S1"]).due_at(400),
            TrainRequest::new("B", 1, 220, ["S1"]).due_at(500),
        ]
    }

    fn planned() -> Schedule {
        Schedule::from_items([
            ScheduleItem::new("A", "S1", 0, 100),
            ScheduleItem::new("B", "S1", 220, 320),
        ])
        .unwrap()
    }

    #[test]
    fn quiet_cycle_changes_nothing() {
        let (n, t) = (network(), trains());
        let live = LiveSchedule::new(planned());
        let predictor = FixedDelays::default();
        let config = ResolutionConfig::default();
        let report = run_cycle(&live, &n, &t, &predictor, None, &config).unwrap();
        assert_eq!(report.outcome, CycleOutcome::NoConflicts);
        assert_eq!(live.version(), 0);
        assert_eq!(*live.snapshot().1, planned());
    }

    #[test]
    fn delayed_cycle_commits_and_audits() {
        let (n, t) = (network(), trains());
        let live = LiveSchedule::new(planned());
        let predictor = FixedDelays(PredictedDelays::from_minutes([("A", 3.0)]));
        let audit = MemoryAudit::new();
        let config = ResolutionConfig::default();

        let report = run_cycle(&live, &n, &t, &predictor, Some(&audit), &config).unwrap();
        assert_eq!(report.detected, 1);
        assert_eq!(report.rounds, 1);
        assert!(report.remaining.is_empty());
        assert_eq!(report.outcome, CycleOutcome::Committed { version: 1 });

        let (_, schedule) = live.snapshot();
        assert!(verify(&n, &t, &schedule, BlockPolicy::EntryOnly).is_empty());
        assert!(schedule.first_entry("A").unwrap() >= 180);

        let events = audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::Resolved);
        assert_eq!(events[0].run_id, report.run_id);
        assert_eq!(events[0].kpis.total_trains, 2);
    }

    #[test]
    fn repeated_prediction_is_a_fresh_delay() {
        let (n, t) = (network(), trains());
        let live = LiveSchedule::new(planned());
        let predictor = FixedDelays(PredictedDelays::from_minutes([("A", 3.0)]));
        let config = ResolutionConfig::default();

        run_cycle(&live, &n, &t, &predictor, None, &config).unwrap();
        let first = live.snapshot().1.first_entry("A").unwrap();

        // Delays are relative to the schedule they were predicted on.
        let again = run_cycle(&live, &n, &t, &predictor, None, &config).unwrap();
        assert_eq!(again.outcome, CycleOutcome::Committed { version: 2 });
        let (_, schedule) = live.snapshot();
        assert!(schedule.first_entry("A").unwrap() >= first + 180);
        assert!(verify(&n, &t, &schedule, BlockPolicy::EntryOnly).is_empty());
    }

    #[test]
    fn absorbed_delay_is_not_detected_twice() {
        let (n, t) = (network(), trains());
        let live = LiveSchedule::new(planned());
        let predictor = FixedDelays(PredictedDelays::from_minutes([("A", 3.0)]));
        let mut config = ResolutionConfig::default();
        config.detector.absorb_slack = true;

        let report = run_cycle(&live, &n, &t, &predictor, None, &config).unwrap();
        assert_eq!(report.outcome, CycleOutcome::Committed { version: 1 });
        assert!(report.remaining.is_empty());

        let again = run_cycle(&live, &n, &t, &predictor, None, &config).unwrap();
        assert_eq!(again.outcome, CycleOutcome::NoConflicts);
        assert_eq!(live.version(), 1);
    }

    #[test]
    fn cycle_overtaken_during_prediction_is_superseded() {
        let (n, t) = (network(), trains());
        let live = LiveSchedule::new(planned());
        let predictor = |_: &Network,
                         _: &[TrainRequest],
                         _: &Schedule|
         -> Result<PredictedDelays, PredictError> {
            // A newer cycle starts while this one is predicting.
            let _ = live.begin_cycle();
            Ok(PredictedDelays::from_minutes([("A", 3.0)]))
        };
        let audit = MemoryAudit::new();
        let report = run_cycle(
            &live,
            &n,
            &t,
            &predictor,
            Some(&audit),
            &ResolutionConfig::default(),
        )
        .unwrap();
        assert_eq!(report.outcome, CycleOutcome::Superseded);
        assert_eq!(report.rounds, 0);
        assert_eq!(live.version(), 0);
        assert_eq!(audit.events()[0].kind, AuditKind::Superseded);
    }

    #[test]
    fn prediction_failure_is_reported() {
        let (n, t) = (network(), trains());
        let live = LiveSchedule::new(planned());
        let predictor = |_: &Network,
                         _: &[TrainRequest],
                         _: &Schedule|
         -> Result<PredictedDelays, PredictError> {
            Err(PredictError("model offline".into()))
        };
        let err = run_cycle(&live, &n, &t, &predictor, None, &ResolutionConfig::default())
            .unwrap_err();
        assert!(matches!(err, CycleError::Prediction(_)));
    }
}
