// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-eventlog
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The event log (C6): a per-project atomic sequence counter plus a bounded
//! FIFO ring of the last `K` appended events, used for catch-up replay on
//! register/reconnect.

use contex_core::Event;
use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

/// Default bounded ring size (K), matching spec §4.6.
pub const DEFAULT_RING_CAPACITY: usize = 1024;

/// Result of a catch-up query ([`EventLog::since`]).
#[derive(Debug, Clone, PartialEq)]
pub struct SinceResult {
    /// Events with `seq > cursor` still retained in the ring, in ascending
    /// sequence order.
    pub events: Vec<Event>,
    /// `true` when `cursor` was older than the oldest retained event — the
    /// caller must treat this as "fall back to a fresh initial snapshot"
    /// rather than trusting `events` to be complete.
    pub truncated: bool,
}

struct Shard {
    counter: u64,
    ring: VecDeque<Event>,
    capacity: usize,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        Self {
            counter: 0,
            ring: VecDeque::new(),
            capacity,
        }
    }
}

/// A multi-project event log.
///
/// Each project has its own counter and ring, locked independently so that
/// appends to one project never contend with reads or appends on another.
pub struct EventLog {
    capacity: usize,
    projects: RwLock<BTreeMap<String, RwLock<Shard>>>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl EventLog {
    /// Create a new event log with the given per-project ring capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            projects: RwLock::new(BTreeMap::new()),
        }
    }

    fn with_shard_mut<R>(&self, project: &str, f: impl FnOnce(&mut Shard) -> R) -> R {
        {
            let projects = self.projects.read().unwrap();
            if let Some(shard) = projects.get(project) {
                return f(&mut shard.write().unwrap());
            }
        }
        let mut projects = self.projects.write().unwrap();
        let shard = projects
            .entry(project.to_string())
            .or_insert_with(|| RwLock::new(Shard::new(self.capacity)));
        f(&mut shard.write().unwrap())
    }

    fn with_shard<R>(&self, project: &str, f: impl FnOnce(&Shard) -> R) -> Option<R> {
        let projects = self.projects.read().unwrap();
        let shard = projects.get(project)?.read().unwrap();
        Some(f(&shard))
    }

    /// Atomically assign and return the next sequence number for `project`.
    ///
    /// Sequence numbers start at 1 and are strictly increasing, gap-free,
    /// per project (spec invariant 1).
    pub fn assign_seq(&self, project: &str) -> u64 {
        self.with_shard_mut(project, |shard| {
            shard.counter += 1;
            shard.counter
        })
    }

    /// Append `event` (which must already carry the sequence assigned by
    /// [`Self::assign_seq`]) to `project`'s ring, evicting the oldest entry
    /// FIFO if the ring exceeds capacity.
    pub fn append(&self, project: &str, event: Event) {
        self.with_shard_mut(project, |shard| {
            shard.ring.push_back(event);
            while shard.ring.len() > shard.capacity {
                shard.ring.pop_front();
            }
        });
    }

    /// The current (highest-assigned) sequence number for `project`, or `0`
    /// if nothing has been published yet.
    #[must_use]
    pub fn current_seq(&self, project: &str) -> u64 {
        self.with_shard(project, |shard| shard.counter).unwrap_or(0)
    }

    /// Events appended after `cursor`, for catch-up on register/reconnect.
    #[must_use]
    pub fn since(&self, project: &str, cursor: u64) -> SinceResult {
        self.with_shard(project, |shard| {
            if shard.counter <= cursor {
                return SinceResult {
                    events: Vec::new(),
                    truncated: false,
                };
            }
            let matching: Vec<Event> = shard
                .ring
                .iter()
                .filter(|e| e.seq > cursor)
                .cloned()
                .collect();
            let truncated = match shard.ring.front() {
                Some(oldest) => cursor + 1 < oldest.seq,
                None => true,
            };
            SinceResult {
                events: matching,
                truncated,
            }
        })
        .unwrap_or(SinceResult {
            events: Vec::new(),
            truncated: false,
        })
    }

    /// Drop all state for `project` (explicit project reset).
    pub fn reset(&self, project: &str) {
        let mut projects = self.projects.write().unwrap();
        projects.remove(project);
    }
}
