// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-delivery
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The delivery fabric (C7): two sinks (broker, webhook) plus the
//! per-agent ordered queue that feeds them. See [`broker`], [`webhook`],
//! and [`queue`] for the individual pieces; [`Dispatcher`] wires a sink
//! choice to telemetry recording for the orchestrator to drive.

pub mod broker;
pub mod queue;
pub mod webhook;

pub use broker::{BrokerPublisher, InProcessBroker};
pub use queue::{AgentQueue, PushOutcome, DEFAULT_QUEUE_CAPACITY};
pub use webhook::WebhookClient;

use contex_core::{Agent, DeliveryTarget, Notification};
use contex_telemetry::{DeliveryMetrics, DeliveryOutcome, DeliverySink, MetricsCollector};
use std::sync::Arc;
use std::time::Instant;

/// Delivers one notification to one agent through whichever sink the
/// agent's [`DeliveryTarget`] selects, recording the outcome.
pub struct Dispatcher {
    broker: Arc<dyn BrokerPublisher>,
    webhook: WebhookClient,
    metrics: MetricsCollector,
}

impl Dispatcher {
    /// Build a dispatcher over the given broker publisher and metrics
    /// collector, with a fresh [`WebhookClient`].
    #[must_use]
    pub fn new(broker: Arc<dyn BrokerPublisher>, metrics: MetricsCollector) -> Self {
        Self { broker, webhook: WebhookClient::new(), metrics }
    }

    /// Deliver `notification` to `agent` via its configured sink,
    /// recording a [`DeliveryMetrics`] entry regardless of outcome.
    pub async fn deliver(&self, agent: &Agent, notification: &Notification, attempt: u32) -> DeliveryOutcome {
        let payload = serde_json::to_string(notification).unwrap_or_else(|_| "{}".to_string());
        let started = Instant::now();

        let outcome = match &agent.delivery {
            DeliveryTarget::Broker => {
                let channel = broker::channel_name(&agent.project_id, &agent.id);
                self.broker.publish(&channel, &payload).await;
                DeliveryOutcome::Delivered
            }
            DeliveryTarget::Webhook { url, secret } => match self.webhook.deliver(url, secret, payload.as_bytes()).await {
                Ok(status) if status < 400 => DeliveryOutcome::Delivered,
                Ok(_) => DeliveryOutcome::Failed,
                Err(_) => DeliveryOutcome::Failed,
            },
        };

        let sink = match &agent.delivery {
            DeliveryTarget::Broker => DeliverySink::Broker,
            DeliveryTarget::Webhook { .. } => DeliverySink::Webhook,
        };

        self.metrics.record(DeliveryMetrics {
            project_id: agent.project_id.clone(),
            agent_id: agent.id.clone(),
            sink,
            attempt,
            duration_ms: started.elapsed().as_millis() as u64,
            outcome,
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn broker_agent() -> Agent {
        Agent {
            project_id: "p1".to_string(),
            id: "a1".to_string(),
            delivery: DeliveryTarget::Broker,
            registered_at: Utc::now(),
            cursor: 0,
        }
    }

    fn sample_notification() -> Notification {
        Notification::DataUpdate {
            sequence: 1,
            data_key: "k".to_string(),
            data: json!({"v": 1}),
            matched_needs: vec!["need".to_string()],
        }
    }

    #[tokio::test]
    async fn broker_delivery_is_always_delivered_and_recorded() {
        let broker = Arc::new(InProcessBroker::new());
        let dispatcher = Dispatcher::new(broker.clone(), MetricsCollector::new());
        let outcome = dispatcher.deliver(&broker_agent(), &sample_notification(), 1).await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(broker.history("agent:p1:a1").len(), 1);
        assert_eq!(dispatcher.metrics.len(), 1);
    }
}
