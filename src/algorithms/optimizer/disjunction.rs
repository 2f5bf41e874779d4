//! Disjunctive constraints between legs.
//!
//! Every pair of legs contending for a resource gets one [`Disjunction`]:
//! an explicit two-valued choice of which goes first, each side compiling
//! to a difference constraint `x_to >= x_from + weight` on entry times.

use crate::algorithms::ConstraintKind;
use crate::network::{Instance, LegRef};
use crate::units::Time;

/// Flat numbering of legs as search variables.
#[derive(Debug, Clone)]
pub struct Vars {
    offsets: Vec<usize>,
    refs: Vec<LegRef>,
}

impl Vars {
    pub fn new(instance: &Instance<'_>) -> Self {
        let mut offsets = Vec::with_capacity(instance.trains().len());
        let mut refs = Vec::with_capacity(instance.leg_count());
        for (r, _) in instance.legs() {
            if r.leg == 0 {
                offsets.push(refs.len());
            }
            refs.push(r);
        }
        Self { offsets, refs }
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn of(&self, r: LegRef) -> usize {
        self.offsets[r.train] + r.leg
    }

    pub fn leg(&self, v: usize) -> LegRef {
        self.refs[v]
    }

    /// Splits flat entry times into per-train, per-leg vectors.
    pub fn unflatten(&self, instance: &Instance<'_>, x: &[Time]) -> Vec<Vec<Time>> {
        instance
            .trains()
            .iter()
            .zip(&self.offsets)
            .map(|(plan, &off)| x[off..off + plan.legs.len()].to_vec())
            .collect()
    }

    pub fn flatten(&self, entries: &[Vec<Time>]) -> Vec<Time> {
        entries.iter().flatten().copied().collect()
    }
}

/// The resource a disjunction protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Headway on one section.
    Section(usize),
    /// Clearance between two linked sections.
    Link(usize, usize),
    /// Exclusive pre-entry dwell on a capacity-1 platform.
    Platform(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    AThenB,
    BThenA,
}

/// `a` before `b` requires `x_b >= x_a + a_then_b`; `b` before `a`
/// requires `x_a >= x_b + b_then_a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disjunction {
    pub resource: Resource,
    pub a: usize,
    pub b: usize,
    pub a_then_b: Time,
    pub b_then_a: Time,
}

impl Disjunction {
    pub fn kind(&self) -> ConstraintKind {
        match self.resource {
            Resource::Section(_) => ConstraintKind::Headway,
            Resource::Link(..) => ConstraintKind::Clearance,
            Resource::Platform(_) => ConstraintKind::Platform,
        }
    }

    pub fn holds(&self, x: &[Time], order: Order) -> bool {
        match order {
            Order::AThenB => x[self.b] >= x[self.a] + self.a_then_b,
            Order::BThenA => x[self.a] >= x[self.b] + self.b_then_a,
        }
    }

    pub fn is_satisfied(&self, x: &[Time]) -> bool {
        self.holds(x, Order::AThenB) || self.holds(x, Order::BThenA)
    }

    /// `(from, to, weight)` of the difference constraint for `order`.
    pub fn arc(&self, order: Order) -> (usize, usize, Time) {
        match order {
            Order::AThenB => (self.a, self.b, self.a_then_b),
            Order::BThenA => (self.b, self.a, self.b_then_a),
        }
    }
}

/// Builds every pairwise disjunction of `instance`.
///
/// Pairs whose separation is zero constrain nothing and are skipped.
/// Platforms with more than one slot are not pairwise and are handled by
/// [`find_overfull`].
pub fn build(instance: &Instance<'_>, vars: &Vars) -> Vec<Disjunction> {
    let network = instance.network();
    let mut out = Vec::new();

    for s in 0..network.len() {
        let section = network.section(s);
        let on = instance.legs_on(s);
        for (i, &ra) in on.iter().enumerate() {
            for &rb in &on[i + 1..] {
                let (la, lb) = (instance.leg(ra), instance.leg(rb));
                let (a, b) = (vars.of(ra), vars.of(rb));
                let sep = section.traverse_seconds + section.headway_seconds;
                if sep > 0 {
                    out.push(Disjunction {
                        resource: Resource::Section(s),
                        a,
                        b,
                        a_then_b: sep,
                        b_then_a: sep,
                    });
                }
                if section.platform_capacity == Some(1) && la.dwell > 0 && lb.dwell > 0 {
                    out.push(Disjunction {
                        resource: Resource::Platform(s),
                        a,
                        b,
                        a_then_b: lb.dwell,
                        b_then_a: la.dwell,
                    });
                }
            }
        }

        for (o, clearance) in network.linked(s) {
            if o < s {
                continue;
            }
            for &ra in instance.legs_on(s) {
                for &rb in instance.legs_on(o) {
                    if ra.train == rb.train {
                        continue;
                    }
                    out.push(Disjunction {
                        resource: Resource::Link(s, o),
                        a: vars.of(ra),
                        b: vars.of(rb),
                        a_then_b: clearance.seconds,
                        b_then_a: clearance.seconds,
                    });
                }
            }
        }
    }
    out
}

/// A participant in a platform clique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Member {
    Var(usize),
    Fixed(usize),
}

/// More than `capacity` pre-entry dwell intervals sharing instant `at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overfull {
    pub section: usize,
    pub at: Time,
    /// Exactly `capacity + 1` members, variables first.
    pub members: Vec<Member>,
}

/// Earliest over-full instant on any multi-slot platform under entry
/// times `x`, ignoring instants where only fixed obligations dwell.
pub fn find_overfull(instance: &Instance<'_>, vars: &Vars, x: &[Time]) -> Option<Overfull> {
    let network = instance.network();
    let mut best: Option<Overfull> = None;

    for s in 0..network.len() {
        let capacity = match network.section(s).platform_capacity {
            Some(c) if c > 1 => c as usize,
            _ => continue,
        };
        let mut intervals: Vec<(Time, Time, Member)> = Vec::new();
        for &r in instance.legs_on(s) {
            let leg = instance.leg(r);
            if leg.dwell > 0 {
                let v = vars.of(r);
                intervals.push((x[v] - leg.dwell, x[v], Member::Var(v)));
            }
        }
        if intervals.is_empty() {
            continue;
        }
        // One variable can overfill a platform held by fixed dwellers alone.
        for &fi in instance.fixed_on(s) {
            let f = &instance.fixed()[fi];
            if f.dwell > 0 {
                intervals.push((f.entry - f.dwell, f.entry, Member::Fixed(fi)));
            }
        }
        if intervals.len() <= capacity {
            continue;
        }

        for &(at, _, _) in &intervals {
            if best.as_ref().is_some_and(|b| b.at <= at) {
                continue;
            }
            let mut present: Vec<Member> = intervals
                .iter()
                .filter(|(start, end, _)| *start <= at && at < *end)
                .map(|(_, _, m)| *m)
                .collect();
            if present.len() <= capacity || !present.iter().any(|m| matches!(m, Member::Var(_))) {
                continue;
            }
            present.sort_by_key(|m| matches!(m, Member::Fixed(_)));
            present.truncate(capacity + 1);
            best = Some(Overfull {
                section: s,
                at,
                members: present,
            });
        }
    }
    best
}
