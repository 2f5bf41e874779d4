//! Append-only audit trail of committed cycles.

use std::sync::{Arc, Mutex, PoisonError};

use crate::kpi::KpiReport;
use crate::schedule::Schedule;
use crate::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AuditKind {
    /// A cycle resolved conflicts and committed a new version.
    Resolved,
    /// A cycle's result lost to a newer cycle and was dropped.
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// UUID v4 of the cycle.
    pub run_id: Id,
    pub kind: AuditKind,
    /// Version committed, or the version the dropped cycle read.
    pub version: u64,
    pub conflicts: usize,
    pub schedule: Arc<Schedule>,
    pub kpis: KpiReport,
}

/// Receives audit events. The scheduler never reads them back.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        log::trace!("audit {:?} run {} v{}", event.kind, event.run_id, event.version);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
