use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::metrics::MetricsSnapshot;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub metrics: MetricsSnapshot,
    /// Per-component status
    pub services: BTreeMap<&'static str, &'static str>,
}

/// Health check endpoint
///
/// Reports uptime, gateway counters and the live connection count.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = state.metrics.snapshot(state.registry.count());

    let services = BTreeMap::from([
        ("websocket", "operational"),
        ("vertex_ai", "operational"),
        ("tts", "operational"),
    ]);

    Json(HealthResponse {
        status: "healthy",
        uptime_seconds: metrics.uptime_seconds,
        metrics,
        services,
    })
}
