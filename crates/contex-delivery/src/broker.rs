// SPDX-License-Identifier: MIT OR Apache-2.0
//! Broker sink: best-effort publish onto `"agent:{project}:{agent_id}"`.
//!
//! The broker itself (a topic-based pub/sub such as Redis) is an external
//! collaborator, out of scope for this crate. [`BrokerPublisher`] is the
//! seam a real deployment plugs into; [`InProcessBroker`] is the in-memory
//! stand-in used by the daemon and by tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Build the canonical broker channel name for an agent.
#[must_use]
pub fn channel_name(project_id: &str, agent_id: &str) -> String {
    format!("agent:{project_id}:{agent_id}")
}

/// A sink that publishes a JSON-encoded payload onto a named channel.
///
/// Delivery is best-effort: implementations must not retry, and a publish
/// error here is logged but never surfaced as a delivery failure to the
/// caller (spec §4.7 — the broker sink has no terminal/retry states).
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Publish `payload` (already-serialized JSON) onto `channel`.
    async fn publish(&self, channel: &str, payload: &str);
}

/// In-memory broker stand-in: each channel is a bounded backlog of the most
/// recently published payloads, readable by subscribers polling or
/// reconnecting. Not persistent across process restarts.
#[derive(Debug, Default)]
pub struct InProcessBroker {
    channels: Mutex<BTreeMap<String, Vec<String>>>,
}

impl InProcessBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All payloads ever published on `channel`, oldest first.
    #[must_use]
    pub fn history(&self, channel: &str) -> Vec<String> {
        self.channels.lock().expect("broker lock poisoned").get(channel).cloned().unwrap_or_default()
    }

    /// Number of distinct channels with at least one published payload.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.lock().expect("broker lock poisoned").len()
    }
}

#[async_trait]
impl BrokerPublisher for InProcessBroker {
    async fn publish(&self, channel: &str, payload: &str) {
        tracing::debug!(target: "contex.delivery.broker", channel, "publishing to broker channel");
        self.channels
            .lock()
            .expect("broker lock poisoned")
            .entry(channel.to_string())
            .or_default()
            .push(payload.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_matches_spec_format() {
        assert_eq!(channel_name("proj-1", "agent-a"), "agent:proj-1:agent-a");
    }

    #[tokio::test]
    async fn in_process_broker_records_history_per_channel() {
        let broker = InProcessBroker::new();
        broker.publish("agent:p:a", "{\"one\":1}").await;
        broker.publish("agent:p:a", "{\"two\":2}").await;
        broker.publish("agent:p:b", "{\"three\":3}").await;

        assert_eq!(broker.history("agent:p:a"), vec!["{\"one\":1}", "{\"two\":2}"]);
        assert_eq!(broker.history("agent:p:b"), vec!["{\"three\":3}"]);
        assert_eq!(broker.channel_count(), 2);
    }

    #[tokio::test]
    async fn unknown_channel_has_empty_history() {
        let broker = InProcessBroker::new();
        assert!(broker.history("agent:p:missing").is_empty());
    }
}
