// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable data model for Contex.
//!
//! If you only take one dependency, take this one.

/// Domain-level validation helpers (accumulate-all-errors style).
pub mod validate;
/// Similarity-threshold and service-level domain configuration defaults.
pub mod config;
/// Event filtering for agent notification streams.
pub mod filter;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current contract version string embedded in notification payloads.
///
/// # Examples
///
/// ```
/// assert_eq!(contex_core::CONTRACT_VERSION, "contex/v1");
/// ```
pub const CONTRACT_VERSION: &str = "contex/v1";

/// Default cosine-similarity threshold (τ) below which a data item is not
/// considered a match for a subscription.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.30;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A namespace that scopes all data items, agents, and subscriptions.
///
/// Projects are created implicitly on first use (the first publish or agent
/// registration against an unknown `project_id` creates it).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    /// Caller-supplied project identifier. Opaque to Contex.
    pub id: String,
    /// When this project was first observed.
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project record with `created_at` set to `now`.
    #[must_use]
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// DataItem
// ---------------------------------------------------------------------------

/// A single keyed data item published into a project.
///
/// The same `key` republished overwrites the previous value in place (it is
/// not versioned); only the latest value is matched against subscriptions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataItem {
    /// Project this item belongs to.
    pub project_id: String,
    /// Caller-supplied key. Unique within a project.
    pub key: String,
    /// Raw value as published by the producer.
    pub value: serde_json::Value,
    /// Format detected for `value` by the parser pipeline.
    pub format: DataFormat,
    /// Flattened, truncated text rendered from `value` for embedding.
    pub embedding_text: String,
    /// Dense embedding vector for `embedding_text`, if generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Monotonic per-project sequence number assigned at publish time.
    pub seq: u64,
    /// When this value was published (last-write time).
    pub published_at: DateTime<Utc>,
}

/// Format a producer declared (`format_hint`) or Contex detected for a
/// published value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// JSON object or array.
    Json,
    /// YAML document.
    Yaml,
    /// TOML document.
    Toml,
    /// XML document.
    Xml,
    /// Comma-separated values.
    Csv,
    /// Markdown document.
    Markdown,
    /// Source code (language-agnostic).
    Code,
    /// Plain, unstructured text.
    PlainText,
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Xml => "xml",
            Self::Csv => "csv",
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::PlainText => "plain_text",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A consumer that has registered one or more data needs against a project.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Agent {
    /// Project this agent is registered under.
    pub project_id: String,
    /// Caller-supplied agent identifier. Unique within a project.
    pub id: String,
    /// How matched data items are delivered to this agent.
    pub delivery: DeliveryTarget,
    /// When this agent registered.
    pub registered_at: DateTime<Utc>,
    /// Per-project event-log cursor the agent has consumed up to.
    pub cursor: u64,
}

/// Where matched data items are delivered for a given agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryTarget {
    /// In-process broker channel, best-effort, no retry.
    Broker,
    /// HTTP webhook, HMAC-signed, retried on transient failure.
    Webhook {
        /// Destination URL for signed `POST` requests.
        url: String,
        /// Shared secret used to compute the HMAC-SHA256 signature.
        #[serde(skip_serializing)]
        secret: String,
    },
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A single natural-language "data need" registered by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Subscription {
    /// Project this subscription belongs to.
    pub project_id: String,
    /// Owning agent's id.
    pub agent_id: String,
    /// Free-text description of the data the agent wants.
    pub need: String,
    /// Dense embedding vector for `need`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Similarity threshold override; falls back to the project/service
    /// default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    /// Data keys currently considered matching, so a republish that stays
    /// above threshold does not re-deliver and a drop below threshold does
    /// not emit an "unmatch" event.
    pub matched_keys: std::collections::BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single entry in a project's event log.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Project this event belongs to.
    pub project_id: String,
    /// Monotonic per-project sequence number, assigned at append time.
    pub seq: u64,
    /// When this event was appended.
    pub ts: DateTime<Utc>,
    /// The event payload.
    pub kind: EventKind,
}

/// Discriminated event payloads appended to a project's event log.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A data item was published (or republished) under `key`.
    DataPublished {
        /// The published key.
        key: String,
    },
    /// `agent_id`'s subscription newly matched `key` with the given cosine
    /// similarity `score`.
    Matched {
        /// Matching agent.
        agent_id: String,
        /// Matching data key.
        key: String,
        /// Cosine similarity score in `[-1.0, 1.0]`.
        score: f32,
    },
    /// An agent registered a new subscription.
    AgentRegistered {
        /// Newly registered agent.
        agent_id: String,
    },
    /// An agent unregistered (all of its subscriptions were removed).
    AgentUnregistered {
        /// Unregistered agent.
        agent_id: String,
    },
}

impl EventKind {
    /// Canonical lowercase tag for this event kind, matching its serde
    /// `"type"` discriminant.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::DataPublished { .. } => "data_published",
            Self::Matched { .. } => "matched",
            Self::AgentRegistered { .. } => "agent_registered",
            Self::AgentUnregistered { .. } => "agent_unregistered",
        }
    }

    /// The agent this event is scoped to, if any.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::Matched { agent_id, .. }
            | Self::AgentRegistered { agent_id }
            | Self::AgentUnregistered { agent_id } => Some(agent_id.as_str()),
            Self::DataPublished { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Notification payloads (wire shapes delivered to agents)
// ---------------------------------------------------------------------------

/// One data item matching a need, as carried in an `initial_context`'s
/// per-need match list (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ContextMatch {
    /// The matching data key.
    pub data_key: String,
    /// Raw published value.
    pub data: serde_json::Value,
    /// Cosine similarity of the need's embedding to this item's vector.
    pub similarity: f32,
    /// Sequence number at which this item was last published.
    pub sequence: u64,
}

/// The three notification payload shapes delivered to agents, matching the
/// wire contract in spec §6 field-for-field.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Sent once when an agent registers (or reconnects with a cursor),
    /// carrying every currently-matching data item grouped by the need it
    /// matched.
    InitialContext {
        /// The sequence this snapshot was taken at (the agent's new
        /// cursor).
        sequence: u64,
        /// `need -> matching items`, in declaration order.
        context: BTreeMap<String, Vec<ContextMatch>>,
    },
    /// Sent when a newly published or republished item starts matching one
    /// or more of an agent's needs. Exactly one is sent per agent per
    /// publish even when multiple needs match (spec §4.5).
    DataUpdate {
        /// The publish sequence that produced this update.
        sequence: u64,
        /// The published data key.
        data_key: String,
        /// Raw published value.
        data: serde_json::Value,
        /// Every need (in declaration order) this publish matched for the
        /// agent.
        matched_needs: Vec<String>,
    },
    /// Sent for agent-lifecycle or log-level events the agent subscribed to
    /// out-of-band (e.g. via `GET /projects/{id}/data` polling fallback).
    Event {
        /// The underlying event kind's tag (`data_published`, `matched`, …).
        event_type: String,
        /// Sequence number of the underlying event.
        sequence: u64,
        /// Type-specific fields of the underlying event, minus its own
        /// `type` tag (already surfaced as `event_type`).
        data: serde_json::Value,
    },
}

impl Notification {
    /// Build an out-of-band `event` notification from a logged [`Event`],
    /// lifting its `type` tag up to `event_type` and leaving the rest of
    /// the kind's fields as `data` (spec §6).
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        let mut value = serde_json::to_value(&event.kind).unwrap_or(serde_json::Value::Null);
        let event_type = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(event.kind.tag())
            .to_string();
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("type");
        }
        Self::Event { event_type, sequence: event.seq, data: value }
    }
}

/// A trimmed view of a [`DataItem`] suitable for delivery payloads (omits
/// the embedding vector).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataItemSummary {
    /// The data key.
    pub key: String,
    /// Raw published value.
    pub value: serde_json::Value,
    /// Detected format.
    pub format: DataFormat,
    /// Sequence number at publish time.
    pub seq: u64,
    /// Publish timestamp.
    pub published_at: DateTime<Utc>,
}

impl From<&DataItem> for DataItemSummary {
    fn from(item: &DataItem) -> Self {
        Self {
            key: item.key.clone(),
            value: item.value.clone(),
            format: item.format,
            seq: item.seq,
            published_at: item.published_at,
        }
    }
}

/// Arbitrary vendor extension bag reserved for future non-breaking
/// additions to wire payloads.
pub type ExtBag = BTreeMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_version_is_stable() {
        assert_eq!(CONTRACT_VERSION, "contex/v1");
    }

    #[test]
    fn data_format_display_matches_serde() {
        for (fmt, expected) in [
            (DataFormat::Json, "json"),
            (DataFormat::Yaml, "yaml"),
            (DataFormat::Toml, "toml"),
            (DataFormat::Xml, "xml"),
            (DataFormat::Csv, "csv"),
            (DataFormat::Markdown, "markdown"),
            (DataFormat::Code, "code"),
            (DataFormat::PlainText, "plain_text"),
        ] {
            assert_eq!(fmt.to_string(), expected);
            let json = serde_json::to_string(&fmt).unwrap();
            assert_eq!(json, format!("\"{expected}\""));
        }
    }

    #[test]
    fn event_kind_tag_matches_serde_discriminant() {
        let e = EventKind::DataPublished {
            key: "foo".into(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], e.tag());
    }

    #[test]
    fn event_kind_agent_id() {
        assert_eq!(
            EventKind::Matched {
                agent_id: "a1".into(),
                key: "k".into(),
                score: 0.9
            }
            .agent_id(),
            Some("a1")
        );
        assert_eq!(
            EventKind::DataPublished { key: "k".into() }.agent_id(),
            None
        );
    }

    #[test]
    fn data_item_summary_omits_embedding() {
        let item = DataItem {
            project_id: "p1".into(),
            key: "k".into(),
            value: serde_json::json!({"a": 1}),
            format: DataFormat::Json,
            embedding_text: "a: 1".into(),
            embedding: Some(vec![0.1, 0.2]),
            seq: 1,
            published_at: Utc::now(),
        };
        let summary = DataItemSummary::from(&item);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("embedding"));
    }

    #[test]
    fn webhook_secret_never_serialized() {
        let target = DeliveryTarget::Webhook {
            url: "https://example.com/hook".into(),
            secret: "super-secret".into(),
        };
        let json = serde_json::to_string(&target).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("example.com"));
    }

    #[test]
    fn data_update_wire_shape_matches_spec() {
        let n = Notification::DataUpdate {
            sequence: 2,
            data_key: "coding_standards".into(),
            data: serde_json::json!({"style": "PEP 8", "max_line_length": 120}),
            matched_needs: vec!["code style rules".into()],
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "data_update");
        assert_eq!(v["sequence"], 2);
        assert_eq!(v["data_key"], "coding_standards");
        assert_eq!(v["data"]["max_line_length"], 120);
        assert_eq!(v["matched_needs"][0], "code style rules");
    }

    #[test]
    fn initial_context_wire_shape_groups_by_need() {
        let mut context = BTreeMap::new();
        context.insert(
            "code style rules".to_string(),
            vec![ContextMatch {
                data_key: "coding_standards".into(),
                data: serde_json::json!({"style": "PEP 8"}),
                similarity: 0.42,
                sequence: 1,
            }],
        );
        let n = Notification::InitialContext { sequence: 1, context };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "initial_context");
        assert_eq!(v["sequence"], 1);
        assert_eq!(v["context"]["code style rules"][0]["data_key"], "coding_standards");
    }

    #[test]
    fn event_notification_lifts_type_tag() {
        let event = Event {
            project_id: "p".into(),
            seq: 5,
            ts: Utc::now(),
            kind: EventKind::Matched { agent_id: "a".into(), key: "k".into(), score: 0.9 },
        };
        let n = Notification::from_event(&event);
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "event");
        assert_eq!(v["event_type"], "matched");
        assert_eq!(v["sequence"], 5);
        assert_eq!(v["data"]["agent_id"], "a");
        assert!(v["data"].get("type").is_none());
    }
}
