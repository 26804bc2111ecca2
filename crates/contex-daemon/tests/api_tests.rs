// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end HTTP surface tests for the Contex daemon (spec §6, §8).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use contex_config::ContexConfig;
use contex_daemon::{router, Contex};
use contex_delivery::InProcessBroker;
use contex_embed::DeterministicEmbeddingClient;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_router() -> axum::Router {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    router(ctx)
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn health_returns_ok_status() {
    let (status, body) = get_json(test_router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn publish_assigns_a_sequence_number() {
    let (status, body) = post_json(
        test_router(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "coding_standards", "data": {"style": "PEP 8"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sequence"], 1);
    assert_eq!(body["data_key"], "coding_standards");
}

#[tokio::test]
async fn publish_with_empty_data_key_is_rejected() {
    let (status, body) = post_json(
        test_router(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "", "data": {"x": 1}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn register_then_matching_publish_is_visible_in_query() {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    let app = router(ctx);

    let (status, _) = post_json(
        app.clone(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "doc", "data": {"topic": "rust memory safety"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        app.clone(),
        "/agents/register",
        json!({
            "agent_id": "agent-a",
            "project_id": "proj-1",
            "data_needs": ["rust memory safety topic"],
            "notification_method": "redis"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched_needs"]["rust memory safety topic"], 1);
    assert_eq!(body["notification_channel"], "agent:proj-1:agent-a");

    let (status, body) = post_json(
        app.clone(),
        "/query",
        json!({"project_id": "proj-1", "query": "rust memory safety topic"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["results"][0]["data_key"], "doc");
}

#[tokio::test]
async fn unrelated_need_matches_nothing() {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    let app = router(ctx);

    for key in ["a", "b", "c"] {
        let (status, _) = post_json(
            app.clone(),
            "/data/publish",
            json!({"project_id": "proj-1", "data_key": key, "data": {"value": key}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = post_json(
        app.clone(),
        "/agents/register",
        json!({
            "agent_id": "agent-x",
            "project_id": "proj-1",
            "data_needs": ["zzz qqq totally unrelated jargon"],
            "notification_method": "redis"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched_needs"]["zzz qqq totally unrelated jargon"], 0);
}

#[tokio::test]
async fn register_requires_webhook_url_and_secret_for_webhook_method() {
    let (status, body) = post_json(
        test_router(),
        "/agents/register",
        json!({
            "agent_id": "agent-w",
            "project_id": "proj-1",
            "data_needs": ["anything"],
            "notification_method": "webhook"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unregister_unknown_agent_is_not_found() {
    let (status, body) = post_json(
        test_router(),
        "/agents/ghost/unregister",
        json!({"project_id": "proj-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unregister_known_agent_returns_no_content() {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    let app = router(ctx);

    post_json(
        app.clone(),
        "/agents/register",
        json!({
            "agent_id": "agent-a",
            "project_id": "proj-1",
            "data_needs": ["anything"],
            "notification_method": "redis"
        }),
    )
    .await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/agents/agent-a/unregister")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json!({"project_id": "proj-1"})).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn list_data_reflects_published_items() {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    let app = router(ctx);

    post_json(
        app.clone(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "k1", "data": {"v": 1}}),
    )
    .await;

    let (status, body) = get_json(app.clone(), "/projects/proj-1/data").await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["data_key"], "k1");
}

#[tokio::test]
async fn republish_refreshes_sequence_and_value() {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    let app = router(ctx);

    post_json(
        app.clone(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "k1", "data": {"v": 1}}),
    )
    .await;
    let (status, body) = post_json(
        app.clone(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "k1", "data": {"v": 2}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sequence"], 2);

    let (_, body) = get_json(app.clone(), "/projects/proj-1/data").await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["data"]["v"], 2);
}

#[tokio::test]
async fn register_with_no_cursor_gets_a_fresh_cursor_at_current_sequence() {
    let ctx = Contex::new(
        ContexConfig::default(),
        Arc::new(DeterministicEmbeddingClient::new(32)),
        Arc::new(InProcessBroker::new()),
    );
    let app = router(ctx);

    post_json(
        app.clone(),
        "/data/publish",
        json!({"project_id": "proj-1", "data_key": "k1", "data": {"v": 1}}),
    )
    .await;

    let (status, body) = post_json(
        app.clone(),
        "/agents/register",
        json!({
            "agent_id": "agent-a",
            "project_id": "proj-1",
            "data_needs": ["anything"],
            "notification_method": "redis"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["last_seen_sequence"], 1);
    assert_eq!(body["catchup_truncated"], false);
}
