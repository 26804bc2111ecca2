// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-agent ordered delivery queue (spec §5 "Per-agent delivery").
//!
//! Each agent owns one bounded FIFO queue so that a slow sink for agent A
//! cannot reorder A's own events, while never blocking delivery to other
//! agents. `data_update` entries for the same key coalesce (a superseded
//! update need not be delivered on its own); on overflow the oldest entry
//! is dropped and the queue is marked lagged so the caller resets the
//! agent's cursor rather than silently skip a notification.

use contex_core::Notification;
use std::collections::VecDeque;

/// Default bound on a single agent's pending-delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A single queued notification, tagged with the data key it supersedes
/// (when applicable) so a later `data_update` for the same key can
/// coalesce with it.
#[derive(Debug, Clone)]
struct QueuedEntry {
    coalesce_key: Option<String>,
    notification: Notification,
}

/// Result of pushing a notification onto an [`AgentQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended as a new entry.
    Enqueued,
    /// Replaced an existing not-yet-delivered entry for the same key.
    Coalesced,
    /// The queue was full; the oldest entry was dropped to make room. The
    /// caller must reset this agent's cursor (spec: lagging-agent cursor
    /// reset on overflow).
    Lagged,
}

/// A bounded, coalescing, strictly-ordered queue of notifications destined
/// for one agent.
#[derive(Debug)]
pub struct AgentQueue {
    entries: VecDeque<QueuedEntry>,
    capacity: usize,
}

impl AgentQueue {
    /// Create a queue with the given bound.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { entries: VecDeque::with_capacity(capacity.min(256)), capacity }
    }

    fn coalesce_key(notification: &Notification) -> Option<String> {
        match notification {
            Notification::DataUpdate { data_key, .. } => Some(data_key.clone()),
            Notification::InitialContext { .. } | Notification::Event { .. } => None,
        }
    }

    /// Push a notification. `data_update` notifications for a key already
    /// queued (but not yet popped) replace that entry in place, preserving
    /// its position — this keeps ordering intact while avoiding delivering
    /// a value that was immediately superseded.
    pub fn push(&mut self, notification: Notification) -> PushOutcome {
        let key = Self::coalesce_key(&notification);

        if let Some(ref k) = key {
            if let Some(existing) = self
                .entries
                .iter_mut()
                .find(|e| e.coalesce_key.as_deref() == Some(k.as_str()))
            {
                existing.notification = notification;
                return PushOutcome::Coalesced;
            }
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.entries.push_back(QueuedEntry { coalesce_key: key, notification });
            return PushOutcome::Lagged;
        }

        self.entries.push_back(QueuedEntry { coalesce_key: key, notification });
        PushOutcome::Enqueued
    }

    /// Pop the oldest pending notification.
    pub fn pop(&mut self) -> Option<Notification> {
        self.entries.pop_front().map(|e| e.notification)
    }

    /// Number of pending notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue has no pending notifications.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(key: &str, score: f32) -> Notification {
        Notification::DataUpdate {
            sequence: 1,
            data_key: key.to_string(),
            data: json!({"v": 1}),
            matched_needs: vec![format!("need for {score}")],
        }
    }

    #[test]
    fn enqueue_and_pop_preserve_order() {
        let mut q = AgentQueue::new(10);
        assert_eq!(q.push(update("a", 0.5)), PushOutcome::Enqueued);
        assert_eq!(q.push(update("b", 0.6)), PushOutcome::Enqueued);
        assert_eq!(q.len(), 2);

        let first = q.pop().unwrap();
        match first {
            Notification::DataUpdate { data_key, .. } => assert_eq!(data_key, "a"),
            _ => panic!("expected data update"),
        }
    }

    #[test]
    fn repeated_key_coalesces_in_place() {
        let mut q = AgentQueue::new(10);
        q.push(update("a", 0.1));
        q.push(update("b", 0.2));
        let outcome = q.push(update("a", 0.9));
        assert_eq!(outcome, PushOutcome::Coalesced);
        assert_eq!(q.len(), 2);

        // "a" kept its original queue position, but with the refreshed need set.
        let first = q.pop().unwrap();
        match first {
            Notification::DataUpdate { data_key, matched_needs, .. } => {
                assert_eq!(data_key, "a");
                assert_eq!(matched_needs[0], "need for 0.9");
            }
            _ => panic!("expected data update"),
        }
    }

    #[test]
    fn overflow_drops_oldest_and_reports_lagged() {
        let mut q = AgentQueue::new(2);
        assert_eq!(q.push(update("a", 0.1)), PushOutcome::Enqueued);
        assert_eq!(q.push(update("b", 0.1)), PushOutcome::Enqueued);
        let outcome = q.push(update("c", 0.1));
        assert_eq!(outcome, PushOutcome::Lagged);
        assert_eq!(q.len(), 2);

        let first = q.pop().unwrap();
        match first {
            Notification::DataUpdate { data_key, .. } => assert_eq!(data_key, "b"),
            _ => panic!("expected data update"),
        }
    }

    #[test]
    fn initial_context_never_coalesces() {
        let mut q = AgentQueue::new(10);
        let ctx = Notification::InitialContext { sequence: 0, context: Default::default() };
        q.push(ctx.clone());
        q.push(ctx);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn empty_queue_pops_none() {
        let mut q = AgentQueue::new(DEFAULT_QUEUE_CAPACITY);
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }
}
