// SPDX-License-Identifier: MIT OR Apache-2.0
//! Wire DTOs for the Contex HTTP surface (spec §6).

use chrono::{DateTime, Utc};
use contex_core::DataFormat;
use contex_error::ContexErrorDto;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body returned for every non-2xx response: one entry per accumulated
/// validation error, or a single entry for not-found/internal failures.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ErrorResponse {
    /// The errors that caused this request to fail.
    pub errors: Vec<ContexErrorDto>,
}

/// `POST /data/publish` request body.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PublishRequest {
    /// Project namespace.
    pub project_id: String,
    /// Unique key within the project.
    pub data_key: String,
    /// Raw payload: a JSON value (object) or a bare string for textual
    /// formats (YAML/TOML/XML/CSV/Markdown/code/plain text).
    pub data: serde_json::Value,
    /// Optional format hint (`"json"`, `"yaml"`, ...); bypasses sniffing
    /// for the matching parser only.
    #[serde(default)]
    pub data_format: Option<DataFormat>,
    /// Optional vendor metadata, stored but not interpreted.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// `POST /data/publish` response body.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PublishResponse {
    /// Echoed project id.
    pub project_id: String,
    /// Echoed data key.
    pub data_key: String,
    /// The sequence number assigned to this publish.
    pub sequence: u64,
}

/// `POST /agents/register` request body.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RegisterRequest {
    /// Caller-chosen agent identifier.
    pub agent_id: String,
    /// Project namespace.
    pub project_id: String,
    /// Natural-language needs to match data against.
    pub data_needs: Vec<String>,
    /// `"redis"` (broker) or `"webhook"`.
    pub notification_method: String,
    /// Required when `notification_method == "webhook"`.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Required when `notification_method == "webhook"`.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    /// When present, catch-up is attempted from this cursor instead of a
    /// fresh snapshot.
    #[serde(default)]
    pub last_seen_sequence: Option<u64>,
}

/// `POST /agents/register` response body.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RegisterResponse {
    /// Echoed agent id.
    pub agent_id: String,
    /// Echoed project id.
    pub project_id: String,
    /// Broker channel name, present only for `notification_method == "redis"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_channel: Option<String>,
    /// `need -> number of currently-matching data keys`.
    pub matched_needs: BTreeMap<String, usize>,
    /// Number of ring events replayed during catch-up (0 for a fresh
    /// snapshot or a truncated cursor).
    pub caught_up_events: usize,
    /// Whether `since` found the caller's cursor already evicted from the
    /// ring; when true, `caught_up_events` is 0 and the agent received a
    /// fresh `initial_context` instead.
    pub catchup_truncated: bool,
    /// The agent's cursor after this register call.
    pub last_seen_sequence: u64,
}

/// `POST /agents/{id}/unregister` request body.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UnregisterRequest {
    /// Project the agent was registered under.
    pub project_id: String,
}

/// `POST /query` request body.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryRequest {
    /// Project namespace.
    pub project_id: String,
    /// Free-form query text, embedded and matched like a need.
    pub query: String,
    /// Maximum number of results (default 10).
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// A single top-k match returned by `/query`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryResultItem {
    /// The matching data key.
    pub data_key: String,
    /// The item's raw published value.
    pub data: serde_json::Value,
    /// Cosine similarity to the query.
    pub similarity_score: f32,
    /// The sequence number at which this item was last published.
    pub sequence: u64,
    /// Publish timestamp.
    pub timestamp: DateTime<Utc>,
}

/// `POST /query` response body.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryResponse {
    /// Results, highest similarity first.
    pub results: Vec<QueryResultItem>,
    /// Total number of results returned (== `results.len()`).
    pub total: usize,
}

/// A single stored item as returned by `GET /projects/{id}/data`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StoredItem {
    /// The data key.
    pub data_key: String,
    /// The item's raw published value.
    pub data: serde_json::Value,
    /// Detected format.
    pub format: DataFormat,
    /// Sequence number at publish time.
    pub sequence: u64,
    /// Publish timestamp.
    pub published_at: DateTime<Utc>,
}

/// `GET /health` response body.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HealthResponse {
    /// Always `"healthy"` when the handler runs at all.
    pub status: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self { status: "healthy" }
    }
}
