//! Half-open time windows and a canonical container for block windows.
//!
//! [`BlockWindows`] keeps its windows sorted by start with no two windows
//! overlapping or abutting (touching windows are merged), so "is this
//! instant blocked" and "when is the next unblocked instant" are a single
//! binary search.

use std::fmt::Display;
use std::ops::Deref;

use crate::units::Time;

/// Half-open interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeWindow {
    start: Time,
    end: Time,
}

impl TimeWindow {
    /// Creates `[start, end)`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    pub const fn new(start: Time, end: Time) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    pub const fn start(&self) -> Time {
        self.start
    }

    pub const fn end(&self) -> Time {
        self.end
    }

    pub const fn duration(&self) -> Time {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns true if `t` ∈ `[start, end)`.
    pub const fn contains(&self, t: Time) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if the two half-open windows share at least one instant.
    pub const fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// How a block window restricts a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BlockPolicy {
    /// Entry may not fall inside the window.
    #[default]
    EntryOnly,
    /// The whole occupancy `[entry, entry + traverse)` must avoid the window.
    Occupancy,
}

/// Sorted, non-overlapping set of half-open windows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockWindows(Vec<TimeWindow>);

impl BlockWindows {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a canonical set from arbitrary windows. Empty windows are dropped.
    pub fn from_windows(windows: impl IntoIterator<Item = TimeWindow>) -> Self {
        let mut set = Self(windows.into_iter().filter(|w| !w.is_empty()).collect());
        set.normalize();
        set
    }

    /// Sorts by start and merges overlapping or touching windows in place.
    fn normalize(&mut self) {
        if self.0.len() <= 1 {
            return;
        }
        self.0.sort();
        let mut merged: Vec<TimeWindow> = Vec::with_capacity(self.0.len());
        for window in self.0.drain(..) {
            match merged.last_mut() {
                Some(last) if last.end >= window.start => {
                    if window.end > last.end {
                        last.end = window.end;
                    }
                }
                _ => merged.push(window),
            }
        }
        self.0 = merged;
    }

    /// Inserts a window, keeping canonical form.
    pub fn push(&mut self, window: TimeWindow) {
        if window.is_empty() {
            return;
        }
        match self.0.last().map(|last| last.end) {
            None => self.0.push(window),
            Some(last_end) if window.start > last_end => self.0.push(window),
            Some(last_end) if window.start == last_end => {
                let idx = self.0.len() - 1;
                self.0[idx].end = window.end;
            }
            Some(_) => {
                self.0.push(window);
                self.normalize();
            }
        }
    }

    /// Returns the window containing `t`, if any.
    pub fn window_at(&self, t: Time) -> Option<TimeWindow> {
        let idx = self.0.partition_point(|w| w.end <= t);
        self.0.get(idx).copied().filter(|w| w.contains(t))
    }

    pub fn contains(&self, t: Time) -> bool {
        self.window_at(t).is_some()
    }

    /// Earliest instant `>= t` outside every window.
    ///
    /// Windows are merged when they touch, so one step always suffices.
    pub fn next_allowed(&self, t: Time) -> Time {
        self.window_at(t).map_or(t, |w| w.end)
    }

    /// Windows during which *entry* is forbidden under `policy` for a
    /// section traversed in `traverse` seconds.
    ///
    /// Under [`BlockPolicy::Occupancy`] an entry at `e` collides with `[a, b)`
    /// iff `e < b && e + traverse > a`, i.e. `e ∈ [a - traverse + 1, b)`.
    pub fn forbidden_entries(&self, policy: BlockPolicy, traverse: Time) -> BlockWindows {
        match policy {
            BlockPolicy::EntryOnly => self.clone(),
            BlockPolicy::Occupancy if traverse <= 0 => self.clone(),
            BlockPolicy::Occupancy => BlockWindows::from_windows(
                self.0
                    .iter()
                    .map(|w| TimeWindow::new(w.start - traverse + 1, w.end)),
            ),
        }
    }

    pub fn as_slice(&self) -> &[TimeWindow] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<TimeWindow> {
        self.0
    }
}

impl Deref for BlockWindows {
    type Target = [TimeWindow];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<TimeWindow>> for BlockWindows {
    fn from(windows: Vec<TimeWindow>) -> Self {
        Self::from_windows(windows)
    }
}

impl FromIterator<TimeWindow> for BlockWindows {
    fn from_iter<I: IntoIterator<Item = TimeWindow>>(iter: I) -> Self {
        Self::from_windows(iter)
    }
}

impl Display for BlockWindows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, w) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{w}")?;
        }
        write!(f, "}}")
    }
}
