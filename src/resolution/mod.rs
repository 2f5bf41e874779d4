//! Conflict resolution and the live control cycle.
//!
//! A resolve re-solves only the trains named by conflict records, holding
//! every other train's nearby use of the network fixed, and merges the
//! result back. The control cycle wraps this around a versioned live
//! schedule: predict delays, detect, resolve, re-detect, then commit
//! unless a newer cycle overtook it.
//!
//! - [`reduce`] - the partial instance around the conflicting trains
//! - [`merge`] - writing a partial schedule back
//! - [`orchestrator`] - [`resolve`] and [`resolve_with_delays`]
//! - [`live`] - versioned schedule with superseding tickets
//! - [`cycle`] - one PREDICT → DETECT → RESOLVE → COMMIT pass
//! - [`pool`] - background solves and cycles on a worker pool
//! - [`predictor`], [`audit`] - outer boundaries of the cycle

pub mod audit;
pub mod cycle;
pub mod live;
pub mod merge;
pub mod orchestrator;
pub mod pool;
pub mod predictor;
pub mod reduce;

pub use audit::{AuditEvent, AuditKind, AuditSink, MemoryAudit};
pub use cycle::{run_cycle, ControlCycle, CycleError, CycleOutcome, CycleReport, CycleRequest};
pub use live::{CommitOutcome, LiveSchedule, Ticket};
pub use merge::merge;
pub use orchestrator::{resolve, resolve_with_delays, Resolution, ResolveError};
pub use pool::{CycleHandle, JobHandle, PoolError, SolveHandle, SolveRequest, SolverPool};
pub use predictor::{FixedDelays, PredictError, Predictor};
pub use reduce::{reduce, ReducedInstance};
