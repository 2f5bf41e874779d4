//! Depth-first branch-and-bound over disjunction orders.

use std::time::{Duration, Instant};

use crate::algorithms::greedy::engine::schedule_all;
use crate::algorithms::{evaluate, ConstraintKind, Cost, InfeasibleCause, Objective};
use crate::config::SolverConfig;
use crate::network::Instance;
use crate::units::Time;

use super::disjunction::{self, Disjunction, Member, Order, Overfull, Vars};
use super::propagate::{Decision, Failure, Node};

/// Failure explanations kept for an infeasibility report.
const MAX_CAUSES: usize = 16;

/// Result of one search run.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Best entry times found, per train and leg, with their cost.
    pub best: Option<(Vec<Vec<Time>>, Cost)>,
    /// The whole tree was explored (or pruned).
    pub exhausted: bool,
    pub nodes: u64,
    pub elapsed: Duration,
    /// Why branches failed, when no schedule was found.
    pub failures: Vec<InfeasibleCause>,
}

/// Choice point found in a node's least solution.
enum Branch {
    Pair(Disjunction),
    Clique(Overfull),
}

pub struct Search<'i, 'n> {
    instance: &'i Instance<'n>,
    objective: Objective,
    config: &'i SolverConfig,
    vars: Vars,
    disjunctions: Vec<Disjunction>,
    incumbent: Option<(Vec<Time>, Cost)>,
    failures: Vec<InfeasibleCause>,
    nodes: u64,
}

impl<'i, 'n> Search<'i, 'n> {
    pub fn new(instance: &'i Instance<'n>, objective: Objective, config: &'i SolverConfig) -> Self {
        let vars = Vars::new(instance);
        let disjunctions = disjunction::build(instance, &vars);
        log::trace!(
            "search over {} legs with {} disjunctions",
            vars.len(),
            disjunctions.len()
        );
        Self {
            instance,
            objective,
            config,
            vars,
            disjunctions,
            incumbent: None,
            failures: Vec::new(),
            nodes: 0,
        }
    }

    fn cost(&self, x: &[Time]) -> Cost {
        evaluate(self.instance, self.objective, &self.vars.unflatten(self.instance, x))
    }

    fn prunable(&self, cost: &Cost) -> bool {
        self.incumbent
            .as_ref()
            .is_some_and(|(_, best)| cost.total_cmp(best).is_ge())
    }

    fn record_failure(&mut self, node: &Node, failure: Failure) {
        if self.failures.len() < MAX_CAUSES {
            let causes = node.explain(self.instance, &self.vars, failure);
            let room = MAX_CAUSES - self.failures.len();
            self.failures.extend(causes.into_iter().take(room));
        }
    }

    fn seed(&mut self) {
        match schedule_all(self.instance) {
            Ok(entries) => {
                let x = self.vars.flatten(&entries);
                let cost = self.cost(&x);
                log::debug!("incumbent seeded from heuristic, cost {cost:?}");
                self.incumbent = Some((x, cost));
            }
            Err(inf) => log::debug!("heuristic seed failed: {inf}"),
        }
    }

    /// Violated choice point with the earliest start, if any.
    fn branch_point(&self, x: &[Time]) -> Option<Branch> {
        let pair = self
            .disjunctions
            .iter()
            .filter(|d| !d.is_satisfied(x))
            .min_by_key(|d| (x[d.a].min(x[d.b]), d.a, d.b))
            .copied();
        let clique = disjunction::find_overfull(self.instance, &self.vars, x);
        match (pair, clique) {
            (Some(d), Some(c)) if c.at < x[d.a].min(x[d.b]) => Some(Branch::Clique(c)),
            (Some(d), _) => Some(Branch::Pair(d)),
            (None, Some(c)) => Some(Branch::Clique(c)),
            (None, None) => None,
        }
    }

    /// Decisions splitting the current node, one per child.
    fn decisions(&self, branch: &Branch) -> Vec<Decision> {
        match branch {
            Branch::Pair(d) => [Order::AThenB, Order::BThenA]
                .into_iter()
                .map(|order| {
                    let (from, to, weight) = d.arc(order);
                    Decision::Arc {
                        from,
                        to,
                        weight,
                        kind: d.kind(),
                    }
                })
                .collect(),
            Branch::Clique(c) => {
                // Among capacity + 1 intervals sharing an instant, some pair
                // must be disjoint in any feasible schedule.
                let mut out = Vec::new();
                for &first in &c.members {
                    for &second in &c.members {
                        if first == second {
                            continue;
                        }
                        if let Some(d) = self.precedes(first, second) {
                            out.push(d);
                        }
                    }
                }
                out
            }
        }
    }

    /// `second`'s dwell starts no earlier than `first`'s entry.
    fn precedes(&self, first: Member, second: Member) -> Option<Decision> {
        let dwell = |v: usize| self.instance.leg(self.vars.leg(v)).dwell;
        match (first, second) {
            (Member::Var(a), Member::Var(b)) => Some(Decision::Arc {
                from: a,
                to: b,
                weight: dwell(b),
                kind: ConstraintKind::Platform,
            }),
            (Member::Fixed(f), Member::Var(v)) => Some(Decision::Raise {
                var: v,
                to: self.instance.fixed()[f].entry + dwell(v),
                kind: ConstraintKind::Platform,
                fixed: f,
            }),
            // Lower bounds only rise, and the variable already dwells
            // across the fixed obligation's start.
            (Member::Var(_), Member::Fixed(_)) | (Member::Fixed(_), Member::Fixed(_)) => None,
        }
    }

    fn budget_spent(&self, started: Instant) -> bool {
        started.elapsed() >= self.config.time_budget
            || self.config.node_limit.is_some_and(|limit| self.nodes >= limit)
    }

    pub fn run(mut self) -> Outcome {
        let started = Instant::now();
        if self.config.seed_with_heuristic {
            self.seed();
        }

        let mut root = Node::root(self.instance, &self.vars);
        let mut stack = Vec::new();
        match root.propagate_all(self.instance, &self.vars) {
            Ok(()) => stack.push(root),
            Err(failure) => self.record_failure(&root, failure),
        }

        let mut exhausted = true;
        while let Some(node) = stack.pop() {
            if self.budget_spent(started) {
                exhausted = false;
                break;
            }
            self.nodes += 1;

            let bound = self.cost(node.x());
            if self.prunable(&bound) {
                continue;
            }
            let Some(branch) = self.branch_point(node.x()) else {
                log::trace!("node {} depth {}: new incumbent {bound:?}", self.nodes, node.depth);
                self.incumbent = Some((node.x().to_vec(), bound));
                continue;
            };

            let mut children = Vec::new();
            for decision in self.decisions(&branch) {
                let mut child = node.clone();
                child.depth += 1;
                match child.apply(self.instance, &self.vars, decision) {
                    Ok(()) => {
                        let cost = self.cost(child.x());
                        if !self.prunable(&cost) {
                            children.push((cost, child));
                        }
                    }
                    Err(failure) => self.record_failure(&child, failure),
                }
            }
            // Worst first, so the most promising child is popped next.
            children.sort_by(|a, b| b.0.total_cmp(&a.0));
            stack.extend(children.into_iter().map(|(_, child)| child));
        }

        let elapsed = started.elapsed();
        log::debug!(
            "branch-and-bound {} after {} nodes in {elapsed:?}",
            if exhausted { "finished" } else { "stopped" },
            self.nodes
        );
        let best = self
            .incumbent
            .take()
            .map(|(x, cost)| (self.vars.unflatten(self.instance, &x), cost));
        Outcome {
            best,
            exhausted,
            nodes: self.nodes,
            elapsed,
            failures: self.failures,
        }
    }
}
