//! Router tests driven with `tower::ServiceExt::oneshot`

mod mock_upstream;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use mock_upstream::{test_config, test_state};
use vertex_live_gateway::routes;

fn upgrade_request() -> Request<Body> {
    Request::builder()
        .uri("/ws")
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_metrics_and_services() {
    let state = test_state(test_config("ws://127.0.0.1:9/ws", "http://127.0.0.1:9/tts"));
    state.metrics.record_connection();
    state.metrics.record_message();

    let response = routes::create_app_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["metrics"]["total_connections"], 1);
    assert_eq!(json["metrics"]["total_messages"], 1);
    assert_eq!(json["metrics"]["active_connections"], 0);
    assert_eq!(json["services"]["websocket"], "operational");
    assert_eq!(json["services"]["vertex_ai"], "operational");
    assert_eq!(json["services"]["tts"], "operational");
}

#[tokio::test]
async fn test_upgrade_rejected_when_slots_taken() {
    let mut config = test_config("ws://127.0.0.1:9/ws", "http://127.0.0.1:9/tts");
    config.max_connections = 2;
    let state = test_state(config);

    let _held: Vec<_> = (0..2)
        .map(|_| state.try_acquire_connection().unwrap())
        .collect();

    let response = routes::create_app_router(state.clone())
        .oneshot(upgrade_request())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Server at capacity. Please try again later.");
    assert_eq!(state.reserved_connections(), 2);
}

#[tokio::test]
async fn test_slot_released_when_upgrade_fails() {
    let mut config = test_config("ws://127.0.0.1:9/ws", "http://127.0.0.1:9/tts");
    config.max_connections = 1;
    let state = test_state(config);

    // oneshot carries no upgradable connection, so the handler itself refuses
    let response = routes::create_app_router(state.clone())
        .oneshot(upgrade_request())
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(state.reserved_connections(), 0);

    // The slot is free for the next attempt
    let response = routes::create_app_router(state.clone())
        .oneshot(upgrade_request())
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(state.reserved_connections(), 0);
}

#[tokio::test]
async fn test_plain_requests_bypass_connection_limit() {
    let mut config = test_config("ws://127.0.0.1:9/ws", "http://127.0.0.1:9/tts");
    config.max_connections = 0;
    let state = test_state(config);

    let app = routes::create_app_router(state);

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let plain = app
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_ne!(plain.status(), StatusCode::SERVICE_UNAVAILABLE);
}
