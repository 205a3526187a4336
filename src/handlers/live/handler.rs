//! Live chat WebSocket handler
//!
//! Upgrades the client connection, opens the matching backend session and
//! runs both pumps until the connection ends.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::{self, Message as UpstreamFrame};
use tracing::{debug, error, info};

use super::{run_egress, run_ingress};
use crate::registry::ClientConnection;
use crate::state::{AppState, ConnectionSlot};

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Bound on closing the backend socket at teardown
const UPSTREAM_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Live chat WebSocket handler
///
/// Upgrades the HTTP connection to a WebSocket speaking the client envelope
/// protocol. The slot reserved by the connection limit middleware is held
/// until the session ends; if the upgrade never completes it is released
/// with the dropped callback.
pub async fn live_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<ConnectionSlot>>,
) -> Response {
    debug!("Live WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            let _slot = slot;
            handle_live_socket(socket, state).await
        })
}

/// Establish the backend session for an upgraded client socket, then proxy.
///
/// When the backend cannot be reached the client socket is closed and no
/// registry entry is created.
pub async fn handle_live_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let upstream = match state.connector.connect().await {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(error = %e, "Failed to set up upstream session");
            state.metrics.record_error();
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    run_session(socket, upstream, &state).await;
}

/// Run both pumps for one registered client connection.
///
/// Returns once both pumps have stopped. Whichever pump stops first closes
/// the client connection, which stops the other. The client is deregistered
/// and the backend socket closed before returning.
pub async fn run_session<C, U>(client_socket: C, upstream: U, state: &AppState)
where
    C: Stream<Item = Result<Message, axum::Error>>
        + Sink<Message, Error = axum::Error>
        + Send
        + 'static,
    U: Stream<Item = Result<UpstreamFrame, tungstenite::Error>>
        + Sink<UpstreamFrame, Error = tungstenite::Error>,
{
    let (client_tx, client_rx) = client_socket.split();
    let (mut upstream_tx, upstream_rx) = upstream.split();

    let client = ClientConnection::new(client_tx);
    let connection_id = client.id();

    state.registry.add(Arc::clone(&client));
    state.metrics.record_connection();
    info!(
        %connection_id,
        active_connections = state.registry.count(),
        "Client connected"
    );

    let ingress = async {
        let exit = run_ingress(client_rx, &mut upstream_tx, &client, &state.metrics).await;
        client.close().await;
        exit
    };
    let egress = async {
        let exit = run_egress(
            upstream_rx,
            &client,
            state.synthesizer.as_ref(),
            state.provider_name(),
            &state.metrics,
        )
        .await;
        client.close().await;
        exit
    };

    let (ingress_exit, egress_exit) = tokio::join!(ingress, egress);

    state.registry.remove(&connection_id);

    match timeout(UPSTREAM_CLOSE_TIMEOUT, upstream_tx.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(%connection_id, error = %e, "Upstream close failed"),
        Err(_) => debug!(%connection_id, "Upstream close timed out"),
    }

    info!(
        %connection_id,
        ingress = ?ingress_exit,
        egress = ?egress_exit,
        active_connections = state.registry.count(),
        "Client disconnected"
    );
}
