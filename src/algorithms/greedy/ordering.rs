//! Train ordering for the forward pass.

use std::cmp::Ordering;

use crate::network::{Instance, TrainPlan};

/// Compares trains by id for deterministic tie-breaking.
pub fn compare_by_id(a: &TrainPlan, b: &TrainPlan) -> Ordering {
    a.id.cmp(&b.id)
}

/// Main comparison: higher priority first, then earlier release, then id.
pub fn compare_trains(a: &TrainPlan, b: &TrainPlan) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.release.cmp(&b.release))
        .then_with(|| compare_by_id(a, b))
}

/// Train indices in processing order.
pub fn train_order(instance: &Instance<'_>) -> Vec<usize> {
    let trains = instance.trains();
    let mut order: Vec<usize> = (0..trains.len()).collect();
    order.sort_by(|&a, &b| compare_trains(&trains[a], &trains[b]));
    order
}
