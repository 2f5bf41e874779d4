//! Worker pool for solves and control cycles.
//!
//! Jobs own an immutable snapshot of their inputs and report back over a
//! channel, so a slow optimizer run never blocks the caller and no two
//! solves share mutable state. Cycles commit through the live schedule's
//! tickets, so a queued cycle overtaken by a later submission is dropped.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::algorithms::{solve, ObjectiveHint, Solution, SolveError, SolverChoice};
use crate::config::{PoolConfig, SolverConfig};
use crate::network::{Network, TrainRequest};

use super::cycle::{CycleError, CycleReport, CycleRequest};
use super::live::LiveSchedule;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("failed to start solver pool: {0}")]
    Build(String),

    /// The job ended without sending a result (it panicked).
    #[error("solver job ended without a result")]
    Lost,

    #[error("solver job still running after {0:?}")]
    Pending(Duration),
}

/// Inputs of one solve.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub network: Network,
    pub trains: Vec<TrainRequest>,
    pub choice: SolverChoice,
    pub hint: ObjectiveHint,
    pub config: SolverConfig,
}

impl SolveRequest {
    pub fn run(&self) -> Result<Solution, SolveError> {
        solve(&self.network, &self.trains, self.choice, self.hint, &self.config)
    }
}

/// Receiving end of a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> JobHandle<T> {
    /// Blocks until the job finishes.
    pub fn wait(self) -> Result<T, PoolError> {
        self.rx.recv().map_err(|_| PoolError::Lost)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, PoolError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            mpsc::RecvTimeoutError::Timeout => PoolError::Pending(timeout),
            mpsc::RecvTimeoutError::Disconnected => PoolError::Lost,
        })
    }

    /// The result, if the job has finished.
    pub fn try_get(&self) -> Option<Result<T, PoolError>> {
        match self.rx.try_recv() {
            Ok(v) => Some(Ok(v)),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(PoolError::Lost)),
        }
    }
}

pub type SolveHandle = JobHandle<Result<Solution, SolveError>>;
pub type CycleHandle = JobHandle<Result<CycleReport, CycleError>>;

pub struct SolverPool {
    pool: rayon::ThreadPool,
}

impl SolverPool {
    pub fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        let name = config.thread_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(move |i| format!("{name}-{i}"))
            .panic_handler(|_| log::error!("solver job panicked"))
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;
        log::debug!("solver pool started with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `job` on the pool.
    pub fn spawn<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || {
            // The caller may have dropped the handle; the result is unwanted then.
            let _ = tx.send(job());
        });
        JobHandle { rx }
    }

    /// Solves a shared snapshot on the pool.
    pub fn submit(&self, request: Arc<SolveRequest>) -> SolveHandle {
        self.spawn(move || request.run())
    }

    /// Queues a control cycle against `live`.
    ///
    /// The ticket is taken at submission, so of two queued cycles the later
    /// one wins whichever worker finishes first.
    pub fn submit_cycle(&self, live: Arc<LiveSchedule>, request: Arc<CycleRequest>) -> CycleHandle {
        let (ticket, base) = live.begin_cycle();
        log::debug!("queued cycle {} on v{}", ticket.token(), ticket.base_version());
        self.spawn(move || request.cycle().run_from(&live, ticket, base))
    }
}

impl std::fmt::Debug for SolverPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverPool")
            .field("threads", &self.threads())
            .finish()
    }
}
