// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-daemon
#![deny(unsafe_code)]
//!
//! The orchestrator (C8): wires the format/normalize pipeline (C1/C2), the
//! embedding client (C3), the vector index (C4), the subscription matcher
//! (C5), the event log (C6), and the delivery fabric (C7) behind
//! `publish`/`register`/`query`, and exposes them over HTTP (spec §6).

/// Wire DTOs for the HTTP surface.
pub mod api;
/// Request-id, logging, rate-limiting, and CORS middleware.
pub mod middleware;

use api::{
    ErrorResponse, HealthResponse, PublishRequest, PublishResponse, QueryRequest, QueryResponse,
    QueryResultItem, RegisterRequest, RegisterResponse, StoredItem, UnregisterRequest,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use contex_core::{validate, Agent, DataItemSummary, DeliveryTarget, Event, EventKind, Notification};
use contex_config::ContexConfig;
use contex_delivery::broker::{channel_name, BrokerPublisher};
use contex_delivery::queue::{AgentQueue, PushOutcome};
use contex_delivery::Dispatcher;
use contex_embed::EmbeddingClient;
use contex_error::{ContexError, ErrorCode};
use contex_eventlog::EventLog;
use contex_index::VectorIndex;
use contex_match::SubscriptionMatcher;
use contex_telemetry::MetricsCollector;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

type ProjectAgentKey = (String, String);

struct AgentWorker {
    queue: std::sync::Mutex<AgentQueue>,
    notify: Notify,
}

impl AgentWorker {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: std::sync::Mutex::new(AgentQueue::new(capacity)),
            notify: Notify::new(),
        })
    }

    fn push(&self, notification: Notification) -> PushOutcome {
        let outcome = self
            .queue
            .lock()
            .expect("agent queue lock poisoned")
            .push(notification);
        self.notify.notify_one();
        outcome
    }

    fn pop(&self) -> Option<Notification> {
        self.queue.lock().expect("agent queue lock poisoned").pop()
    }
}

struct WorkerHandle {
    worker: Arc<AgentWorker>,
    task: JoinHandle<()>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_agent_worker(worker: Arc<AgentWorker>, dispatcher: Arc<Dispatcher>, agent: Agent) {
    loop {
        match worker.pop() {
            Some(notification) => {
                dispatcher.deliver(&agent, &notification, 1).await;
            }
            None => worker.notify.notified().await,
        }
    }
}

/// The orchestrator: owns every shared component and the per-agent
/// delivery workers.
pub struct Contex {
    config: ContexConfig,
    embedding: Arc<dyn EmbeddingClient>,
    index: VectorIndex,
    eventlog: EventLog,
    matcher: SubscriptionMatcher,
    dispatcher: Arc<Dispatcher>,
    agents: RwLock<BTreeMap<ProjectAgentKey, Agent>>,
    workers: RwLock<BTreeMap<ProjectAgentKey, WorkerHandle>>,
    /// One single-writer lock per project (spec §5): sequence assignment,
    /// index upsert, and matcher recomputation for a publish happen while
    /// holding this lock so readers never observe torn state. Different
    /// projects never contend with one another.
    publish_locks: RwLock<BTreeMap<String, Arc<AsyncMutex<()>>>>,
}

impl Contex {
    /// Build a fresh orchestrator over the given embedding client and
    /// broker publisher.
    #[must_use]
    pub fn new(config: ContexConfig, embedding: Arc<dyn EmbeddingClient>, broker: Arc<dyn BrokerPublisher>) -> Arc<Self> {
        let event_ring_capacity = config.event_ring_capacity;
        Arc::new(Self {
            dispatcher: Arc::new(Dispatcher::new(broker, MetricsCollector::new())),
            embedding,
            index: VectorIndex::new(),
            eventlog: EventLog::new(event_ring_capacity),
            matcher: SubscriptionMatcher::new(),
            agents: RwLock::new(BTreeMap::new()),
            workers: RwLock::new(BTreeMap::new()),
            publish_locks: RwLock::new(BTreeMap::new()),
            config,
        })
    }

    fn publish_lock_for(&self, project_id: &str) -> Arc<AsyncMutex<()>> {
        if let Some(lock) = self.publish_locks.read().expect("publish locks poisoned").get(project_id) {
            return lock.clone();
        }
        self.publish_locks
            .write()
            .expect("publish locks poisoned")
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn spawn_worker(self: &Arc<Self>, key: ProjectAgentKey, agent: Agent) -> Arc<AgentWorker> {
        let worker = AgentWorker::new(self.config.agent_queue_capacity);
        let task = tokio::spawn(run_agent_worker(worker.clone(), self.dispatcher.clone(), agent));
        self.workers.write().expect("workers lock poisoned").insert(key, WorkerHandle { worker: worker.clone(), task });
        worker
    }

    fn worker_for(&self, key: &ProjectAgentKey) -> Option<Arc<AgentWorker>> {
        self.workers.read().expect("workers lock poisoned").get(key).map(|h| h.worker.clone())
    }

    fn append_event(&self, project_id: &str, kind: EventKind) -> u64 {
        let seq = self.eventlog.assign_seq(project_id);
        self.eventlog.append(
            project_id,
            Event { project_id: project_id.to_string(), seq, ts: Utc::now(), kind },
        );
        seq
    }

    /// `publish(project, data_key, raw, hint?)` (spec §4.8): normalize,
    /// embed, index, log, recompute matches, and fan out.
    ///
    /// # Errors
    ///
    /// Returns validation errors (400), or a single embedding/format error
    /// (500) if normalization or embedding fails. No sequence is assigned
    /// on failure.
    pub async fn publish(&self, req: PublishRequest) -> Result<PublishResponse, Vec<ContexError>> {
        validate::validate_publish(&req.project_id, &req.data_key)?;

        let raw = match &req.data {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };

        let outcome = contex_parsers::detect_and_normalize(&raw, req.data_format).ok_or_else(|| {
            vec![ContexError::new(ErrorCode::FormatUnrecognized, "no parser accepted this payload")]
        })?;

        let embedding_text = contex_parsers::render_embedding_text(&req.data_key, &outcome);
        let vector = self
            .embedding
            .embed(&embedding_text)
            .await
            .map_err(|e| vec![e])?;

        // Serialize sequence assignment, index upsert, and matcher
        // recomputation per project so readers never observe a torn state
        // (spec §5). Embedding above is a suspension point and is allowed
        // to run concurrently across publishes to the same project; only
        // this section needs single-writer discipline.
        let project_lock = self.publish_lock_for(&req.project_id);
        let _guard = project_lock.lock().await;

        let seq = self.eventlog.assign_seq(&req.project_id);
        let summary = DataItemSummary {
            key: req.data_key.clone(),
            value: req.data.clone(),
            format: outcome.format,
            seq,
            published_at: Utc::now(),
        };
        let payload = serde_json::to_value(&summary).unwrap_or_default();
        self.index.upsert(&req.project_id, &req.data_key, vector.clone(), payload, seq);
        self.eventlog.append(
            &req.project_id,
            Event {
                project_id: req.project_id.clone(),
                seq,
                ts: summary.published_at,
                kind: EventKind::DataPublished { key: req.data_key.clone() },
            },
        );

        let notifications = self.matcher.on_publish(&req.project_id, &req.data_key, &vector, seq);
        for n in notifications {
            self.append_event(
                &req.project_id,
                EventKind::Matched {
                    agent_id: n.agent_id.clone(),
                    key: req.data_key.clone(),
                    score: n.similarity,
                },
            );
            let key = (req.project_id.clone(), n.agent_id.clone());
            if let Some(worker) = self.worker_for(&key) {
                let notification = Notification::DataUpdate {
                    sequence: seq,
                    data_key: req.data_key.clone(),
                    data: summary.value.clone(),
                    matched_needs: n.matched_needs.clone(),
                };
                let outcome = worker.push(notification);
                if outcome == PushOutcome::Lagged {
                    self.mark_lagging(&key);
                }
            }
        }

        Ok(PublishResponse { project_id: req.project_id, data_key: req.data_key, sequence: seq })
    }

    fn mark_lagging(&self, key: &ProjectAgentKey) {
        if let Some(agent) = self.agents.write().expect("agents lock poisoned").get_mut(key) {
            agent.cursor = self.eventlog.current_seq(&key.0);
        }
    }

    /// `register(agent_id, project, needs, method, channel_or_url+secret?)`
    /// (spec §4.8): embed needs, snapshot-match against the project's
    /// current items, assign a cursor, and deliver either a replayed
    /// catch-up or a fresh `initial_context`.
    ///
    /// # Errors
    ///
    /// Returns validation errors (400).
    pub async fn register(self: &Arc<Self>, req: RegisterRequest) -> Result<RegisterResponse, Vec<ContexError>> {
        validate::validate_register(&req.agent_id, &req.project_id, &req.data_needs, &req.notification_method)?;

        let delivery = match req.notification_method.as_str() {
            "webhook" => {
                let url = req.webhook_url.clone().ok_or_else(|| {
                    vec![ContexError::new(ErrorCode::ValidationMissingField, "webhook_url is required for notification_method=webhook")]
                })?;
                let secret = req.webhook_secret.clone().ok_or_else(|| {
                    vec![ContexError::new(ErrorCode::ValidationMissingField, "webhook_secret is required for notification_method=webhook")]
                })?;
                DeliveryTarget::Webhook { url, secret }
            }
            _ => DeliveryTarget::Broker,
        };

        let need_vectors = self
            .embedding
            .embed_batch(&req.data_needs)
            .await
            .map_err(|e| vec![e])?;
        let needs: Vec<(String, Vec<f32>)> = req.data_needs.iter().cloned().zip(need_vectors).collect();

        let existing_items: Vec<(String, Vec<f32>)> = self
            .index
            .all(&req.project_id)
            .into_iter()
            .map(|(key, entry)| (key, entry.vector))
            .collect();

        let snapshot = self.matcher.register(
            &req.project_id,
            &req.agent_id,
            &needs,
            self.config.similarity_threshold,
            &existing_items,
        );

        let key = (req.project_id.clone(), req.agent_id.clone());
        let agent = Agent {
            project_id: req.project_id.clone(),
            id: req.agent_id.clone(),
            delivery: delivery.clone(),
            registered_at: Utc::now(),
            cursor: 0,
        };
        self.agents.write().expect("agents lock poisoned").insert(key.clone(), agent.clone());
        let worker = self.spawn_worker(key.clone(), agent);

        let current_seq = self.eventlog.current_seq(&req.project_id);
        let (caught_up_events, catchup_truncated, cursor) = match req.last_seen_sequence {
            Some(cursor) => {
                let since = self.eventlog.since(&req.project_id, cursor);
                if since.truncated {
                    deliver_initial_context(&worker, &self.index, &req.project_id, &snapshot, current_seq);
                    (0, true, current_seq)
                } else {
                    for event in &since.events {
                        worker.push(Notification::from_event(event));
                    }
                    (since.events.len(), false, current_seq)
                }
            }
            None => {
                deliver_initial_context(&worker, &self.index, &req.project_id, &snapshot, current_seq);
                (0, false, current_seq)
            }
        };

        if let Some(agent) = self.agents.write().expect("agents lock poisoned").get_mut(&key) {
            agent.cursor = cursor;
        }
        self.append_event(&req.project_id, EventKind::AgentRegistered { agent_id: req.agent_id.clone() });

        let notification_channel = matches!(delivery, DeliveryTarget::Broker)
            .then(|| channel_name(&req.project_id, &req.agent_id));

        Ok(RegisterResponse {
            agent_id: req.agent_id,
            project_id: req.project_id,
            notification_channel,
            matched_needs: snapshot.counts(),
            caught_up_events,
            catchup_truncated,
            last_seen_sequence: cursor,
        })
    }

    /// `unregister(project, agent_id)`: drop the agent's subscriptions and
    /// worker.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::AgentNotFound`] if the agent isn't registered.
    pub fn unregister(&self, project_id: &str, agent_id: &str) -> Result<(), ContexError> {
        let key = (project_id.to_string(), agent_id.to_string());
        let removed = self.agents.write().expect("agents lock poisoned").remove(&key);
        if removed.is_none() {
            return Err(ContexError::new(ErrorCode::AgentNotFound, format!("agent not registered: {agent_id}")));
        }
        self.workers.write().expect("workers lock poisoned").remove(&key);
        self.matcher.unregister(project_id, agent_id);
        self.append_event(project_id, EventKind::AgentUnregistered { agent_id: agent_id.to_string() });
        Ok(())
    }

    /// `query(project, q, k)` (spec §4.8): embed the query text and return
    /// the top-k matches by cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns an embedding error (500) if the query cannot be embedded.
    pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse, ContexError> {
        let vector = self.embedding.embed(&req.query).await?;
        let k = req.max_results.unwrap_or(10);
        let hits = self.index.search(&req.project_id, &vector, k);

        let mut results = Vec::with_capacity(hits.len());
        for (data_key, similarity) in hits {
            if let Some(entry) = self.index.get(&req.project_id, &data_key) {
                if let Ok(summary) = serde_json::from_value::<DataItemSummary>(entry.payload) {
                    results.push(QueryResultItem {
                        data_key,
                        data: summary.value,
                        similarity_score: similarity,
                        sequence: entry.seq,
                        timestamp: summary.published_at,
                    });
                }
            }
        }

        let total = results.len();
        Ok(QueryResponse { results, total })
    }

    /// `GET /projects/{id}/data`: every currently-stored item in the
    /// project.
    #[must_use]
    pub fn list_data(&self, project_id: &str) -> Vec<StoredItem> {
        self.index
            .all(project_id)
            .into_iter()
            .filter_map(|(data_key, entry)| {
                serde_json::from_value::<DataItemSummary>(entry.payload).ok().map(|summary| StoredItem {
                    data_key,
                    data: summary.value,
                    format: summary.format,
                    sequence: entry.seq,
                    published_at: summary.published_at,
                })
            })
            .collect()
    }
}

fn deliver_initial_context(
    worker: &AgentWorker,
    index: &VectorIndex,
    project_id: &str,
    snapshot: &contex_match::RegisterSnapshot,
    sequence: u64,
) {
    let mut context = BTreeMap::new();
    for (need, matches) in &snapshot.by_need {
        let mut need_matches = Vec::with_capacity(matches.len());
        for m in matches {
            if let Some(entry) = index.get(project_id, &m.data_key) {
                if let Ok(summary) = serde_json::from_value::<DataItemSummary>(entry.payload) {
                    need_matches.push(contex_core::ContextMatch {
                        data_key: m.data_key.clone(),
                        data: summary.value,
                        similarity: m.similarity,
                        sequence: summary.seq,
                    });
                }
            }
        }
        context.insert(need.clone(), need_matches);
    }
    worker.push(Notification::InitialContext { sequence, context });
}

fn error_response(errors: Vec<ContexError>) -> Response {
    let status = errors.first().map_or(500, ContexError::http_status);
    let body = ErrorResponse { errors: errors.iter().map(Into::into).collect() };
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body)).into_response()
}

async fn handle_publish(State(ctx): State<Arc<Contex>>, Json(req): Json<PublishRequest>) -> Response {
    match ctx.publish(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(errors) => error_response(errors),
    }
}

async fn handle_register(State(ctx): State<Arc<Contex>>, Json(req): Json<RegisterRequest>) -> Response {
    match ctx.register(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(errors) => error_response(errors),
    }
}

async fn handle_unregister(
    State(ctx): State<Arc<Contex>>,
    Path(agent_id): Path<String>,
    Json(req): Json<UnregisterRequest>,
) -> Response {
    match ctx.unregister(&req.project_id, &agent_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(vec![e]),
    }
}

async fn handle_query(State(ctx): State<Arc<Contex>>, Json(req): Json<QueryRequest>) -> Response {
    match ctx.query(req).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => error_response(vec![e]),
    }
}

async fn handle_list_data(State(ctx): State<Arc<Contex>>, Path(project_id): Path<String>) -> Response {
    (StatusCode::OK, Json(ctx.list_data(&project_id))).into_response()
}

async fn handle_health() -> Response {
    (StatusCode::OK, Json(HealthResponse::default())).into_response()
}

/// Build the axum [`Router`] exposing the Contex HTTP surface (spec §6)
/// over the given orchestrator.
#[must_use]
pub fn router(ctx: Arc<Contex>) -> Router {
    Router::new()
        .route("/data/publish", post(handle_publish))
        .route("/agents/register", post(handle_register))
        .route("/agents/{id}/unregister", post(handle_unregister))
        .route("/query", post(handle_query))
        .route("/projects/{id}/data", get(handle_list_data))
        .route("/health", get(handle_health))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(axum::middleware::from_fn(middleware::RequestLogger::layer))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contex_delivery::InProcessBroker;
    use contex_embed::DeterministicEmbeddingClient;
    use serde_json::json;

    fn test_contex() -> Arc<Contex> {
        Contex::new(
            ContexConfig::default(),
            Arc::new(DeterministicEmbeddingClient::new(32)),
            Arc::new(InProcessBroker::new()),
        )
    }

    #[tokio::test]
    async fn publish_assigns_sequential_sequence_numbers() {
        let ctx = test_contex();
        let r1 = ctx
            .publish(PublishRequest {
                project_id: "p".into(),
                data_key: "a".into(),
                data: json!({"x": 1}),
                data_format: None,
                metadata: None,
            })
            .await
            .unwrap();
        let r2 = ctx
            .publish(PublishRequest {
                project_id: "p".into(),
                data_key: "b".into(),
                data: json!({"x": 2}),
                data_format: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(r1.sequence, 1);
        assert_eq!(r2.sequence, 2);
    }

    #[tokio::test]
    async fn publish_rejects_empty_data_key() {
        let ctx = test_contex();
        let err = ctx
            .publish(PublishRequest {
                project_id: "p".into(),
                data_key: "".into(),
                data: json!({"x": 1}),
                data_format: None,
                metadata: None,
            })
            .await
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[tokio::test]
    async fn e1_publish_then_register_matches() {
        let ctx = test_contex();
        ctx.publish(PublishRequest {
            project_id: "p".into(),
            data_key: "coding_standards".into(),
            data: json!({"style": "PEP 8", "max_line_length": 100}),
            data_format: None,
            metadata: None,
        })
        .await
        .unwrap();

        let resp = ctx
            .register(RegisterRequest {
                agent_id: "a".into(),
                project_id: "p".into(),
                data_needs: vec!["style PEP 8 max_line_length code".into()],
                notification_method: "redis".into(),
                webhook_url: None,
                webhook_secret: None,
                last_seen_sequence: None,
            })
            .await
            .unwrap();

        assert_eq!(resp.matched_needs.get("style PEP 8 max_line_length code"), Some(&1));
    }

    #[tokio::test]
    async fn e3_unrelated_need_matches_nothing() {
        let ctx = test_contex();
        for key in ["a", "b", "c"] {
            ctx.publish(PublishRequest {
                project_id: "p".into(),
                data_key: key.into(),
                data: json!({"value": key}),
                data_format: None,
                metadata: None,
            })
            .await
            .unwrap();
        }

        let resp = ctx
            .register(RegisterRequest {
                agent_id: "x".into(),
                project_id: "p".into(),
                data_needs: vec!["zzz qqq totally unrelated jargon".into()],
                notification_method: "redis".into(),
                webhook_url: None,
                webhook_secret: None,
                last_seen_sequence: None,
            })
            .await
            .unwrap();

        assert_eq!(resp.matched_needs.get("zzz qqq totally unrelated jargon"), Some(&0));
    }

    #[tokio::test]
    async fn unregister_unknown_agent_is_not_found() {
        let ctx = test_contex();
        let err = ctx.unregister("p", "ghost").unwrap_err();
        assert_eq!(err.code, ErrorCode::AgentNotFound);
    }

    #[tokio::test]
    async fn register_requires_webhook_fields_for_webhook_method() {
        let ctx = test_contex();
        let err = ctx
            .register(RegisterRequest {
                agent_id: "w".into(),
                project_id: "p".into(),
                data_needs: vec!["anything".into()],
                notification_method: "webhook".into(),
                webhook_url: None,
                webhook_secret: None,
                last_seen_sequence: None,
            })
            .await
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[tokio::test]
    async fn query_returns_top_match() {
        let ctx = test_contex();
        ctx.publish(PublishRequest {
            project_id: "p".into(),
            data_key: "doc".into(),
            data: json!({"topic": "rust memory safety"}),
            data_format: None,
            metadata: None,
        })
        .await
        .unwrap();

        let resp = ctx
            .query(QueryRequest { project_id: "p".into(), query: "rust memory safety topic".into(), max_results: Some(5) })
            .await
            .unwrap();
        assert_eq!(resp.total, 1);
        assert_eq!(resp.results[0].data_key, "doc");
    }

    #[tokio::test]
    async fn list_data_reflects_published_items() {
        let ctx = test_contex();
        ctx.publish(PublishRequest {
            project_id: "p".into(),
            data_key: "k".into(),
            data: json!({"v": 1}),
            data_format: None,
            metadata: None,
        })
        .await
        .unwrap();
        let items = ctx.list_data("p");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].data_key, "k");
    }
}
