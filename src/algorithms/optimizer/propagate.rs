//! Search node state and bound propagation.
//!
//! A node holds a lower and an upper bound per variable plus the
//! difference constraints decided so far. Its lower bounds are the least
//! solution of those constraints: propagation raises them along arcs
//! (longest path) and past any single-sided exclusion that the current
//! bound already falls inside.

use std::collections::{HashSet, VecDeque};

use crate::algorithms::{ConstraintKind, InfeasibleCause};
use crate::network::Instance;
use crate::units::Time;

use super::disjunction::Vars;

/// Why a variable's lower bound has its current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    Earliest,
    Arc { from: usize, kind: ConstraintKind },
    Unary { kind: ConstraintKind, fixed: Option<usize> },
}

/// One branching choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// `x_to >= x_from + weight`
    Arc {
        from: usize,
        to: usize,
        weight: Time,
        kind: ConstraintKind,
    },
    /// `x_var >= to`, ordering `var` after fixed obligation `fixed`.
    Raise {
        var: usize,
        to: Time,
        kind: ConstraintKind,
        fixed: usize,
    },
}

/// Propagation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Lower bound of the variable passed its upper bound.
    Bound(usize),
    /// The arc would close a positive cycle.
    Cycle {
        from: usize,
        to: usize,
        kind: ConstraintKind,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    lb: Vec<Time>,
    ub: Vec<Time>,
    reason: Vec<Reason>,
    succ: Vec<Vec<(usize, Time, ConstraintKind)>>,
    pub depth: u32,
}

impl Node {
    /// Root node: route arcs only, bounds from each leg's horizon.
    pub fn root(instance: &Instance<'_>, vars: &Vars) -> Self {
        let n = vars.len();
        let mut lb = Vec::with_capacity(n);
        let mut ub = Vec::with_capacity(n);
        let mut succ = vec![Vec::new(); n];
        for v in 0..n {
            let r = vars.leg(v);
            let leg = instance.leg(r);
            lb.push(leg.earliest);
            ub.push(leg.latest);
            if let Some(next) = instance.train(r.train).legs.get(r.leg + 1) {
                succ[v].push((v + 1, leg.traverse + next.dwell, ConstraintKind::RouteOrder));
            }
        }
        Self {
            lb,
            ub,
            reason: vec![Reason::Earliest; n],
            succ,
            depth: 0,
        }
    }

    /// Current least solution.
    pub fn x(&self) -> &[Time] {
        &self.lb
    }

    pub fn propagate_all(&mut self, instance: &Instance<'_>, vars: &Vars) -> Result<(), Failure> {
        self.propagate(instance, vars, (0..vars.len()).collect())
    }

    /// Applies a branching decision and re-propagates.
    pub fn apply(
        &mut self,
        instance: &Instance<'_>,
        vars: &Vars,
        decision: Decision,
    ) -> Result<(), Failure> {
        match decision {
            Decision::Arc {
                from,
                to,
                weight,
                kind,
            } => {
                if self.reaches(to, from) {
                    return Err(Failure::Cycle { from, to, kind });
                }
                self.succ[from].push((to, weight, kind));
                if self.lb[from] + weight > self.lb[to] {
                    self.lb[to] = self.lb[from] + weight;
                    self.reason[to] = Reason::Arc { from, kind };
                    return self.propagate(instance, vars, VecDeque::from([to]));
                }
                Ok(())
            }
            Decision::Raise {
                var,
                to,
                kind,
                fixed,
            } => {
                if to > self.lb[var] {
                    self.lb[var] = to;
                    self.reason[var] = Reason::Unary {
                        kind,
                        fixed: Some(fixed),
                    };
                    return self.propagate(instance, vars, VecDeque::from([var]));
                }
                Ok(())
            }
        }
    }

    /// Returns true if `to` is reachable from `from` over decided arcs.
    fn reaches(&self, from: usize, to: usize) -> bool {
        if from == to {
            return true;
        }
        let mut seen = vec![false; self.succ.len()];
        let mut stack = vec![from];
        seen[from] = true;
        while let Some(v) = stack.pop() {
            for &(w, _, _) in &self.succ[v] {
                if w == to {
                    return true;
                }
                if !seen[w] {
                    seen[w] = true;
                    stack.push(w);
                }
            }
        }
        false
    }

    fn propagate(
        &mut self,
        instance: &Instance<'_>,
        vars: &Vars,
        mut queue: VecDeque<usize>,
    ) -> Result<(), Failure> {
        while let Some(v) = queue.pop_front() {
            self.settle(instance, vars, v);
            if self.lb[v] > self.ub[v] {
                return Err(Failure::Bound(v));
            }
            let from = self.lb[v];
            for &(to, weight, kind) in &self.succ[v] {
                if from + weight > self.lb[to] {
                    self.lb[to] = from + weight;
                    self.reason[to] = Reason::Arc { from: v, kind };
                    queue.push_back(to);
                }
            }
        }
        Ok(())
    }

    /// Raises `v` past every exclusion its lower bound falls inside:
    /// forbidden entry windows and the headway, clearance and
    /// capacity-1 platform zones of fixed obligations. Each zone is a
    /// single interval, and a bound inside it rules out the earlier side.
    fn settle(&mut self, instance: &Instance<'_>, vars: &Vars, v: usize) {
        let r = vars.leg(v);
        let leg = instance.leg(r);
        let s = leg.section;
        let network = instance.network();
        let section = network.section(s);
        let headway = section.headway_seconds;
        let exclusive = section.platform_capacity == Some(1) && leg.dwell > 0;

        loop {
            let x = self.lb[v];
            if x > self.ub[v] {
                return;
            }
            let mut next = (x, Reason::Earliest);
            let mut raise = |to: Time, kind: ConstraintKind, fixed: Option<usize>| {
                if to > next.0 {
                    next = (to, Reason::Unary { kind, fixed });
                }
            };

            if let Some(w) = instance.forbidden(s).window_at(x) {
                raise(w.end(), ConstraintKind::BlockWindow, None);
            }
            for &fi in instance.fixed_on(s) {
                let f = &instance.fixed()[fi];
                if instance.same_train(r.train, f) {
                    continue;
                }
                if x < f.exit + headway && x + leg.traverse + headway > f.entry {
                    raise(f.exit + headway, ConstraintKind::Headway, Some(fi));
                }
                if exclusive && f.dwell > 0 && f.entry - f.dwell < x && x - leg.dwell < f.entry {
                    raise(f.entry + leg.dwell, ConstraintKind::Platform, Some(fi));
                }
            }
            for (o, clearance) in network.linked(s) {
                for &fi in instance.fixed_on(o) {
                    let f = &instance.fixed()[fi];
                    if !instance.same_train(r.train, f) && (x - f.entry).abs() < clearance.seconds {
                        raise(f.entry + clearance.seconds, ConstraintKind::Clearance, Some(fi));
                    }
                }
            }

            if next.0 == x {
                return;
            }
            self.lb[v] = next.0;
            self.reason[v] = next.1;
        }
    }

    /// Explains a failure by walking the reasons behind the offending
    /// bound back to its origin.
    pub fn explain(&self, instance: &Instance<'_>, vars: &Vars, failure: Failure) -> Vec<InfeasibleCause> {
        let cause = |v: usize, constraint: ConstraintKind, other_train: Option<String>| {
            let r = vars.leg(v);
            InfeasibleCause {
                train: instance.train(r.train).id.clone(),
                section: instance.network().section(instance.leg(r).section).id.clone(),
                constraint,
                other_train,
            }
        };
        let train_of = |v: usize| instance.train(vars.leg(v).train).id.clone();

        let mut causes = Vec::new();
        let mut v = match failure {
            Failure::Cycle { from, to, kind } => {
                causes.push(cause(to, kind, Some(train_of(from))));
                to
            }
            Failure::Bound(v) => v,
        };
        let mut seen = HashSet::new();
        while seen.insert(v) {
            match self.reason[v] {
                Reason::Earliest => {
                    if causes.is_empty() {
                        causes.push(cause(v, ConstraintKind::Horizon, None));
                    }
                    break;
                }
                Reason::Unary { kind, fixed } => {
                    let other = fixed.map(|fi| instance.fixed()[fi].train_id.clone());
                    causes.push(cause(v, kind, other));
                    break;
                }
                Reason::Arc { from, kind } => {
                    let other = (kind != ConstraintKind::RouteOrder).then(|| train_of(from));
                    causes.push(cause(v, kind, other));
                    v = from;
                }
            }
        }
        causes
    }
}
