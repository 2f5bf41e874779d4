//! Delay prediction boundary.

use thiserror::Error;

use crate::conflicts::PredictedDelays;
use crate::network::{Network, TrainRequest};
use crate::schedule::Schedule;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("delay prediction failed: {0}")]
pub struct PredictError(pub String);

/// External delay model.
///
/// Called once per control cycle with the schedule the cycle read; it
/// must return a complete delay map before detection starts.
pub trait Predictor: Send + Sync {
    fn predict(
        &self,
        network: &Network,
        trains: &[TrainRequest],
        schedule: &Schedule,
    ) -> Result<PredictedDelays, PredictError>;
}

/// Returns the same delays every time, for replays and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedDelays(pub PredictedDelays);

impl Predictor for FixedDelays {
    fn predict(
        &self,
        _network: &Network,
        _trains: &[TrainRequest],
        _schedule: &Schedule,
    ) -> Result<PredictedDelays, PredictError> {
        Ok(self.0.clone())
    }
}

impl<F> Predictor for F
where
    F: Fn(&Network, &[TrainRequest], &Schedule) -> Result<PredictedDelays, PredictError>
        + Send
        + Sync,
{
    fn predict(
        &self,
        network: &Network,
        trains: &[TrainRequest],
        schedule: &Schedule,
    ) -> Result<PredictedDelays, PredictError> {
        self(network, trains, schedule)
    }
}
