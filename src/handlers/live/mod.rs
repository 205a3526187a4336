//! Live chat WebSocket proxy
//!
//! Each client connection is served by two pumps running concurrently:
//! - `ingress`: client frames translated to upstream messages
//! - `egress`: upstream frames translated to client envelopes
//!
//! `handler` owns the session lifecycle around them.

pub mod egress;
pub mod handler;
pub mod ingress;
pub mod messages;

pub use egress::run_egress;
pub use handler::{handle_live_socket, live_handler, run_session};
pub use ingress::run_ingress;
pub use messages::{ClientEnvelope, ClientFrame, TurnBuffer};

use futures::{Sink, SinkExt};
use std::fmt::Display;
use tokio_tungstenite::tungstenite::Message as UpstreamFrame;
use tracing::{debug, warn};

use crate::registry::ClientConnection;

/// Why a pump stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum PumpExit {
    /// The connection was closed from outside (other pump or sweeper)
    Cancelled,
    /// The client closed its socket
    ClientClosed,
    /// Reading from or writing to the client failed
    ClientError(String),
    /// The backend closed its socket
    UpstreamClosed,
    /// Reading from or writing to the backend failed
    UpstreamError(String),
}

/// Fire-and-forget envelope write to the client. Failures are logged only.
pub(crate) async fn notify_client(client: &ClientConnection, envelope: &ClientEnvelope) {
    let result = match envelope.to_json() {
        Ok(json) => client.send_text(json).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        warn!(connection_id = %client.id(), error = %e, "Best-effort client notification failed");
    }
}

/// Fire-and-forget envelope write to the backend. Failures are logged only.
///
/// Abandoned if `client` is closed while the write is pending.
pub(crate) async fn notify_upstream<U>(
    upstream: &mut U,
    client: &ClientConnection,
    envelope: &ClientEnvelope,
) where
    U: Sink<UpstreamFrame> + Unpin,
    U::Error: Display,
{
    let json = match envelope.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize upstream notification");
            return;
        }
    };
    tokio::select! {
        biased;
        _ = client.closed() => {
            debug!(connection_id = %client.id(), "Upstream notification abandoned, connection closed");
        }
        result = upstream.send(UpstreamFrame::Text(json.into())) => {
            if let Err(e) = result {
                warn!(error = %e, "Best-effort upstream notification failed");
            }
        }
    }
}
