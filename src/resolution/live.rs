//! Versioned authoritative schedule with single-writer commits.
//!
//! Every cycle takes a [`Ticket`] when it reads the schedule. A commit is
//! accepted only from the newest ticket and only if nothing was committed
//! since the ticket's read; anything else is superseded and dropped. Work
//! in flight is never interrupted, only its result discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::schedule::Schedule;

/// Claim held by one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    token: u64,
    base_version: u64,
}

impl Ticket {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Schedule version the cycle read.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { version: u64 },
    /// A newer cycle started, or another commit landed, after the read.
    Superseded { newest_token: u64, version: u64 },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}

#[derive(Debug)]
struct Versioned {
    version: u64,
    schedule: Arc<Schedule>,
}

#[derive(Debug)]
pub struct LiveSchedule {
    state: RwLock<Versioned>,
    tokens: AtomicU64,
}

impl LiveSchedule {
    pub fn new(schedule: Schedule) -> Self {
        Self {
            state: RwLock::new(Versioned {
                version: 0,
                schedule: Arc::new(schedule),
            }),
            tokens: AtomicU64::new(0),
        }
    }

    /// Current version and schedule.
    pub fn snapshot(&self) -> (u64, Arc<Schedule>) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.version, Arc::clone(&state.schedule))
    }

    pub fn version(&self) -> u64 {
        self.snapshot().0
    }

    /// Starts a cycle. Any earlier ticket is superseded from here on.
    pub fn begin_cycle(&self) -> (Ticket, Arc<Schedule>) {
        let token = self.tokens.fetch_add(1, Ordering::SeqCst) + 1;
        let (base_version, schedule) = self.snapshot();
        (
            Ticket {
                token,
                base_version,
            },
            schedule,
        )
    }

    /// Returns true if a commit under `ticket` would still be accepted.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.tokens.load(Ordering::SeqCst) == ticket.token && self.version() == ticket.base_version
    }

    pub fn commit(&self, ticket: &Ticket, schedule: Schedule) -> CommitOutcome {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let newest_token = self.tokens.load(Ordering::SeqCst);
        if newest_token != ticket.token || state.version != ticket.base_version {
            log::warn!(
                "discarding result of cycle {} read at v{}: newest cycle {}, schedule at v{}",
                ticket.token,
                ticket.base_version,
                newest_token,
                state.version
            );
            return CommitOutcome::Superseded {
                newest_token,
                version: state.version,
            };
        }
        state.version += 1;
        state.schedule = Arc::new(schedule);
        CommitOutcome::Committed {
            version: state.version,
        }
    }

    /// Replaces the schedule outside any cycle, superseding every open
    /// ticket. Returns the new version.
    pub fn publish(&self, schedule: Schedule) -> u64 {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        self.tokens.fetch_add(1, Ordering::SeqCst);
        state.version += 1;
        state.schedule = Arc::new(schedule);
        state.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleItem;

    fn one(entry: i64) -> Schedule {
        Schedule::from_items([ScheduleItem::new("A", "S1", entry, entry + 10)]).unwrap()
    }

    #[test]
    fn newest_ticket_commits() {
        let live = LiveSchedule::new(one(0));
        let (ticket, base) = live.begin_cycle();
        assert_eq!(base.get("A", "S1").unwrap().entry_time, 0);
        assert!(live.is_current(&ticket));
        assert_eq!(
            live.commit(&ticket, one(5)),
            CommitOutcome::Committed { version: 1 }
        );
        assert_eq!(live.snapshot().1.get("A", "S1").unwrap().entry_time, 5);
    }

    #[test]
    fn stale_ticket_is_superseded() {
        let live = LiveSchedule::new(one(0));
        let (old, _) = live.begin_cycle();
        let (new, _) = live.begin_cycle();
        assert!(!live.is_current(&old));
        assert!(!live.commit(&old, one(5)).is_committed());
        assert!(live.commit(&new, one(7)).is_committed());
        assert_eq!(live.snapshot().1.get("A", "S1").unwrap().entry_time, 7);
    }

    #[test]
    fn ticket_cannot_commit_twice() {
        let live = LiveSchedule::new(one(0));
        let (ticket, _) = live.begin_cycle();
        assert!(live.commit(&ticket, one(5)).is_committed());
        assert_eq!(
            live.commit(&ticket, one(9)),
            CommitOutcome::Superseded {
                newest_token: 1,
                version: 1
            }
        );
    }

    #[test]
    fn publish_supersedes_open_cycles() {
        let live = LiveSchedule::new(one(0));
        let (ticket, _) = live.begin_cycle();
        assert_eq!(live.publish(one(3)), 1);
        assert!(!live.commit(&ticket, one(5)).is_committed());
        assert_eq!(live.version(), 1);
    }

    #[test]
    fn concurrent_cycles_commit_at_most_once_per_version() {
        let live = Arc::new(LiveSchedule::new(one(0)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let live = Arc::clone(&live);
                std::thread::spawn(move || {
                    let (ticket, _) = live.begin_cycle();
                    live.commit(&ticket, one(i)).is_committed()
                })
            })
            .collect();
        let committed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| *c)
            .count();
        assert!(committed >= 1);
        assert_eq!(live.version() as usize, committed);
    }
}
