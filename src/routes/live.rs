//! Live chat WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::live::live_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the live chat WebSocket router
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for the chat proxy
///
/// # Protocol
///
/// Clients send text frames:
/// - `{"type": "text", "content": "..."}` or `{"text": "..."}`
/// - `{"type": "audio", "content": "<base64>"}` (acknowledged)
/// - `{"type": "audio_end", "content": ""}`
/// - `{"type": "image", "content": "<base64 jpeg>"}`
///
/// or binary frames of raw audio (acknowledged).
///
/// Server responds with status envelopes:
///
/// ```json
/// {"status": "connected to Vertex AI", "code": 200, "message": "AI Assistant Ready"}
/// {"status": "streaming", "code": 200, "partial": "Hel"}
/// {"status": "success", "code": 200, "response": "Hello", "audio": "<base64 mp3>"}
/// {"status": "fail", "code": 500, "message": "Error processing AI response"}
/// ```
pub fn create_live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(live_handler))
        .layer(TraceLayer::new_for_http())
}
