pub mod api;
pub mod live;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::connection_limit_middleware;
use crate::state::AppState;

/// Assemble every route with its state.
///
/// The WebSocket route sits behind the connection limit. CORS, rate limiting
/// and security headers are layered on in `main`.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    let live_routes = live::create_live_router().layer(middleware::from_fn_with_state(
        state.clone(),
        connection_limit_middleware,
    ));

    api::create_api_router()
        .merge(live_routes)
        .with_state(state)
}
