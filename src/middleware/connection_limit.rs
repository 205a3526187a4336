//! Connection limit middleware for WebSocket connections
//!
//! Reserves one of `max_connections` session slots before the upgrade runs.
//! The slot travels to the handler as a [`ConnectionSlot`] extension and is
//! released when the session ends, so upgrades racing each other cannot
//! overshoot the limit.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use vertex_live_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/ws", get(live_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError, ConnectionSlot};

/// Middleware that enforces the global connection limit.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// checked. On success the reserved [`ConnectionSlot`] is inserted into the
/// request extensions for the handler to hold; on failure the request is
/// answered with 503 Service Unavailable.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    match state.try_acquire_connection() {
        Ok(slot) => {
            request.extensions_mut().insert::<ConnectionSlot>(slot);
            next.run(request).await
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(
                reserved_connections = state.reserved_connections(),
                max_connections = state.config.max_connections,
                "Rejecting connection: global limit reached"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
    }
}
