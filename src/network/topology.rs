//! Validated, indexed view of a set of sections.
//!
//! Sections are addressed by dense indices (their position in the input).
//! Clearance relations from `conflicts_with` and `conflict_groups` are
//! folded into one undirected `petgraph` graph whose node `i` is section
//! `i` and whose edge weight is the effective clearance between the two
//! endpoints.

use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use super::error::{non_negative, InputError};
use super::section::Section;
use super::window::{BlockWindows, TimeWindow};
use crate::units::Time;
use crate::Id;

/// Where an effective clearance comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClearanceSource {
    /// A direct `conflicts_with` entry on either endpoint.
    Link,
    /// A conflict group shared by both endpoints.
    Group(Id),
}

/// Effective clearance between two linked sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clearance {
    pub seconds: Time,
    pub source: ClearanceSource,
}

#[derive(Debug, Clone)]
pub struct Network {
    sections: Vec<Section>,
    index: HashMap<Id, usize>,
    windows: Vec<BlockWindows>,
    links: UnGraph<usize, Clearance>,
}

impl Network {
    /// Validates `sections` and builds the clearance graph.
    pub fn new(sections: Vec<Section>) -> Result<Self, InputError> {
        let mut index = HashMap::with_capacity(sections.len());
        for (i, s) in sections.iter().enumerate() {
            if index.insert(s.id.clone(), i).is_some() {
                return Err(InputError::DuplicateSection {
                    field: format!("sections[{i}].id"),
                    id: s.id.clone(),
                });
            }
        }

        let mut windows = Vec::with_capacity(sections.len());
        for s in &sections {
            non_negative(|| format!("sections[{}].headway_seconds", s.id), s.headway_seconds)?;
            non_negative(|| format!("sections[{}].traverse_seconds", s.id), s.traverse_seconds)?;
            if s.platform_capacity == Some(0) {
                return Err(InputError::ZeroCapacity {
                    field: format!("sections[{}].platform_capacity", s.id),
                });
            }
            let mut set = BlockWindows::new();
            for (j, &(start, end)) in s.block_windows.iter().enumerate() {
                if start >= end {
                    return Err(InputError::InvalidBlockWindow {
                        field: format!("sections[{}].block_windows[{j}]", s.id),
                        start,
                        end,
                    });
                }
                set.push(TimeWindow::new(start, end));
            }
            windows.push(set);

            for (other, &seconds) in &s.conflicts_with {
                let field = || format!("sections[{}].conflicts_with[{other}]", s.id);
                if *other == s.id {
                    return Err(InputError::SelfConflict { field: field() });
                }
                if !index.contains_key(other) {
                    return Err(InputError::UnknownSection {
                        field: field(),
                        id: other.clone(),
                    });
                }
                non_negative(field, seconds)?;
            }
            for (group, &seconds) in &s.conflict_groups {
                non_negative(|| format!("sections[{}].conflict_groups[{group}]", s.id), seconds)?;
            }
        }

        let links = build_links(&sections, &index);
        Ok(Self {
            sections,
            index,
            windows,
            links,
        })
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.index_of(id).map(|i| &self.sections[i])
    }

    /// Section at a dense index.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of range.
    pub fn section(&self, idx: usize) -> &Section {
        &self.sections[idx]
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Canonical block windows of a section.
    pub fn block_windows(&self, idx: usize) -> &BlockWindows {
        &self.windows[idx]
    }

    /// Effective clearance between two distinct sections, if they are linked.
    pub fn clearance(&self, a: usize, b: usize) -> Option<&Clearance> {
        if a == b {
            return None;
        }
        self.links
            .find_edge(NodeIndex::new(a), NodeIndex::new(b))
            .and_then(|e| self.links.edge_weight(e))
    }

    /// Clearance in seconds between two sections; zero when unlinked.
    pub fn clearance_seconds(&self, a: usize, b: usize) -> Time {
        self.clearance(a, b).map_or(0, |c| c.seconds)
    }

    /// Sections linked to `idx` together with their clearance.
    pub fn linked(&self, idx: usize) -> impl Iterator<Item = (usize, &Clearance)> + '_ {
        let node = NodeIndex::new(idx);
        self.links.edges(node).map(move |e| {
            let other = if e.source() == node { e.target() } else { e.source() };
            (other.index(), e.weight())
        })
    }

    /// Largest clearance any linked section imposes on `idx`.
    pub fn max_clearance(&self, idx: usize) -> Time {
        self.linked(idx).map(|(_, c)| c.seconds).max().unwrap_or(0)
    }

    /// Number of clearance links.
    pub fn link_count(&self) -> usize {
        self.links.edge_count()
    }

    /// Sub-network containing only the sections in `keep`.
    ///
    /// `conflicts_with` entries pointing at dropped sections are removed;
    /// clearances between kept sections are unchanged.
    pub fn restrict(&self, keep: &BTreeSet<Id>) -> Result<Network, InputError> {
        let sections = self
            .sections
            .iter()
            .filter(|s| keep.contains(&s.id))
            .map(|s| {
                let mut s = s.clone();
                s.conflicts_with.retain(|other, _| keep.contains(other));
                s
            })
            .collect();
        Network::new(sections)
    }
}

/// Folds pairwise links and shared groups into one edge per linked pair,
/// keeping the largest clearance. Zero clearances impose nothing and are
/// left out.
fn build_links(sections: &[Section], index: &HashMap<Id, usize>) -> UnGraph<usize, Clearance> {
    let mut graph = UnGraph::with_capacity(sections.len(), 0);
    for i in 0..sections.len() {
        graph.add_node(i);
    }

    let mut best: HashMap<(usize, usize), Clearance> = HashMap::new();
    let mut offer = |a: usize, b: usize, clearance: Clearance| {
        if clearance.seconds <= 0 {
            return;
        }
        let key = (a.min(b), a.max(b));
        let replace = match best.get(&key) {
            Some(cur) => (clearance.seconds, &cur.source) > (cur.seconds, &clearance.source),
            None => true,
        };
        if replace {
            best.insert(key, clearance);
        }
    };

    for (a, s) in sections.iter().enumerate() {
        for (other, &seconds) in &s.conflicts_with {
            if let Some(&b) = index.get(other) {
                offer(
                    a,
                    b,
                    Clearance {
                        seconds,
                        source: ClearanceSource::Link,
                    },
                );
            }
        }
    }

    let mut members: HashMap<&Id, Vec<(usize, Time)>> = HashMap::new();
    for (a, s) in sections.iter().enumerate() {
        for (group, &seconds) in &s.conflict_groups {
            members.entry(group).or_default().push((a, seconds));
        }
    }
    for (group, list) in &members {
        for (x, &(a, ca)) in list.iter().enumerate() {
            for &(b, cb) in &list[x + 1..] {
                offer(
                    a,
                    b,
                    Clearance {
                        seconds: ca.max(cb),
                        source: ClearanceSource::Group((*group).clone()),
                    },
                );
            }
        }
    }

    let mut edges: Vec<_> = best.into_iter().collect();
    edges.sort_by_key(|(key, _)| *key);
    for ((a, b), clearance) in edges {
        graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), clearance);
    }
    graph
}
