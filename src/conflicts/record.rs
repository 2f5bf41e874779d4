//! Conflict records and predicted delays.

use std::collections::BTreeMap;
use std::fmt::Display;

use qtty::{Minute, Quantity};

use crate::units::{time_to_minutes, to_time, Time};
use crate::Id;

/// The resource two trains contend for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ConflictResource {
    /// Both trains use the same section.
    Section { section: Id },
    /// Sections linked through `conflicts_with`, ids in ascending order.
    Link { a: Id, b: Id },
    /// Sections sharing a conflict group, ids in ascending order.
    Group { group: Id, a: Id, b: Id },
}

impl ConflictResource {
    /// Section ids the resource covers.
    pub fn sections(&self) -> Vec<&str> {
        match self {
            ConflictResource::Section { section } => vec![section],
            ConflictResource::Link { a, b } | ConflictResource::Group { a, b, .. } => vec![a, b],
        }
    }
}

impl Display for ConflictResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictResource::Section { section } => write!(f, "{section}"),
            ConflictResource::Link { a, b } => write!(f, "{a}~{b}"),
            ConflictResource::Group { group, a, b } => write!(f, "{group}({a}, {b})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// Grades a shortfall against its requirement. Physical overlap and
    /// coinciding entries are always critical.
    pub fn grade(shortfall: Time, required: Time, coincide: bool) -> Self {
        if coincide {
            Severity::Critical
        } else if 2 * shortfall > required {
            Severity::Major
        } else {
            Severity::Minor
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Two trains whose predicted use of a resource breaks its required gap.
///
/// `train_a` is the one predicted to enter first.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConflictRecord {
    pub train_a: Id,
    pub train_b: Id,
    pub resource: ConflictResource,
    pub severity: Severity,
    /// Predicted entries of `train_a` and `train_b` on the resource.
    pub entry_a: Time,
    pub entry_b: Time,
    /// Predicted gap; negative when occupancies overlap.
    pub gap: Time,
    pub required: Time,
}

impl ConflictRecord {
    /// How much the gap falls short of the requirement (always positive).
    pub fn shortfall(&self) -> Time {
        self.required - self.gap
    }

    pub fn involves(&self, train: &str) -> bool {
        self.train_a == train || self.train_b == train
    }

    pub fn trains(&self) -> [&str; 2] {
        [&self.train_a, &self.train_b]
    }

    /// Earliest predicted entry of the pair.
    pub fn starts_at(&self) -> Time {
        self.entry_a.min(self.entry_b)
    }
}

impl Display for ConflictRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}/{} on {}: gap {}s < {}s",
            self.severity, self.train_a, self.train_b, self.resource, self.gap, self.required
        )
    }
}

/// Externally predicted delay per train, held in whole seconds.
///
/// Trains without an entry are predicted on time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictedDelays(BTreeMap<Id, Time>);

impl PredictedDelays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds delays from `(train, minutes)` pairs.
    pub fn from_minutes<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<Id>,
    {
        let mut delays = Self::new();
        for (train, minutes) in entries {
            delays.insert(train, Quantity::<Minute>::new(minutes));
        }
        delays
    }

    pub fn insert(&mut self, train: impl Into<Id>, delay: Quantity<Minute>) {
        self.0.insert(train.into(), to_time(delay));
    }

    pub fn insert_seconds(&mut self, train: impl Into<Id>, seconds: Time) {
        self.0.insert(train.into(), seconds);
    }

    pub fn remove(&mut self, train: &str) -> Option<Time> {
        self.0.remove(train)
    }

    /// Delay of `train` in seconds, zero when none is predicted.
    pub fn seconds(&self, train: &str) -> Time {
        self.0.get(train).copied().unwrap_or(0)
    }

    pub fn minutes(&self, train: &str) -> Quantity<Minute> {
        time_to_minutes(self.seconds(train) as f64)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Time)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<Id>> FromIterator<(K, f64)> for PredictedDelays {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self::from_minutes(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_convert_minutes_to_seconds() {
        let d: PredictedDelays = [("A", 2.5), ("B", 0.0)].into_iter().collect();
        assert_eq!(d.seconds("A"), 150);
        assert_eq!(d.seconds("B"), 0);
        assert_eq!(d.seconds("Z"), 0);
        assert!((d.minutes("A").value() - 2.5).abs() < 1e-12);
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn severity_grades() {
        assert_eq!(Severity::grade(10, 120, true), Severity::Critical);
        assert_eq!(Severity::grade(61, 120, false), Severity::Major);
        assert_eq!(Severity::grade(60, 120, false), Severity::Minor);
        assert!(Severity::Critical > Severity::Minor);
    }

    #[test]
    fn record_accessors() {
        let r = ConflictRecord {
            train_a: "A".into(),
            train_b: "B".into(),
            resource: ConflictResource::Link {
                a: "S1".into(),
                b: "S2".into(),
            },
            severity: Severity::Minor,
            entry_a: 100,
            entry_b: 130,
            gap: 30,
            required: 45,
        };
        assert_eq!(r.shortfall(), 15);
        assert!(r.involves("B"));
        assert_eq!(r.starts_at(), 100);
        assert_eq!(r.resource.sections(), vec!["S1", "S2"]);
        assert_eq!(r.to_string(), "minor A/B on S1~S2: gap 30s < 45s");
    }
}
