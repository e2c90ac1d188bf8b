//! Workflow API Integration Tests

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use callflow::application::workflow::CANCEL_HANGUP_CAUSE;
use callflow::domain::call::{CallSession, Command};
use callflow::domain::checkpoint::{Checkpoint, CheckpointStore};
use callflow::infrastructure::persistence::MemoryCheckpointStore;
use callflow::interface::api::{build_router, AppState};
use common::{hangup_decision, originate_decision, payload, workflow, ScriptedSwitch};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // For `oneshot`

fn setup_api_test() -> (Router, Arc<ScriptedSwitch>, Arc<MemoryCheckpointStore>) {
    let switch = ScriptedSwitch::new();
    let store = Arc::new(MemoryCheckpointStore::new());
    let workflow = Arc::new(workflow(switch.clone(), store.clone(), hangup_decision("NORMAL_CLEARING")));
    let prometheus_handle = PrometheusBuilder::new().build_recorder().handle();

    let app = build_router(AppState::new(workflow), prometheus_handle);
    (app, switch, store)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_api_health_check() {
    let (app, _, _) = setup_api_test();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], "OK");
}

#[tokio::test]
async fn test_api_start_inbound_workflow() {
    let (app, switch, _) = setup_api_test();

    let response = app
        .oneshot(post_json("/workflows/inbound", &payload("leg-a")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["success"], true);
    assert_eq!(json["data"]["metadata"]["hangupCause"], "NORMAL_CLEARING");
    assert_eq!(switch.app_names(), vec!["uuid_exists", "uuid_kill"]);
}

#[tokio::test]
async fn test_api_dropped_request_cancels_workflow() {
    let switch = ScriptedSwitch::new();
    switch.reply("originate", Ok("+OK leg-b\n".to_string()));
    switch.stall("uuid_bridge");
    let store = Arc::new(MemoryCheckpointStore::new());
    let workflow = Arc::new(workflow(switch.clone(), store.clone(), originate_decision()));
    let prometheus_handle = PrometheusBuilder::new().build_recorder().handle();
    let app = build_router(AppState::new(workflow.clone()), prometheus_handle);

    // The client gives up while the bridge is outstanding
    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        app.oneshot(post_json("/workflows/inbound", &payload("leg-a"))),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::timeout(Duration::from_secs(2), async {
        while workflow.is_running("leg-a") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("workflow kept running after the request was dropped");

    assert_eq!(
        switch.commands().last().unwrap(),
        &Command::new("uuid_kill", format!("leg-b {}", CANCEL_HANGUP_CAUSE))
    );
    assert!(store.load("leg-a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_api_start_rejects_invalid_input() {
    let (app, switch, _) = setup_api_test();

    let response = app
        .oneshot(post_json("/workflows/inbound", &serde_json::json!({ "ani": "0281234567" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().starts_with("invalid input"));
    assert!(switch.commands().is_empty());
}

#[tokio::test]
async fn test_api_get_unknown_workflow() {
    let (app, _, _) = setup_api_test();

    let response = app
        .oneshot(Request::builder().uri("/workflows/leg-z").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_get_stored_workflow() {
    let (app, _, store) = setup_api_test();
    let session =
        CallSession::new("0281234567", "1900", "pbx.example.com", "leg-a", "inbound-ivr", Duration::from_secs(5))
            .unwrap();
    store.save(&Checkpoint::new(session)).await.unwrap();

    let response = app
        .oneshot(Request::builder().uri("/workflows/leg-a").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["workflow_id"], "leg-a");
    assert_eq!(json["data"]["state"], "init");
    assert_eq!(json["data"]["running"], false);
}

#[tokio::test]
async fn test_api_cancel_unknown_workflow() {
    let (app, switch, _) = setup_api_test();

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/workflows/leg-z/cancel")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["workflow_id"], "leg-z");
    assert_eq!(json["data"]["cancelled"], false);
    assert!(switch.commands().is_empty());
}

#[tokio::test]
async fn test_api_metrics_endpoint() {
    let (app, _, _) = setup_api_test();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
