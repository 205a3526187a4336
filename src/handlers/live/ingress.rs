//! Client -> backend pump.

use std::fmt::Display;

use axum::extract::ws::Message;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamFrame;
use tracing::{debug, info, trace, warn};

use super::messages::{ClientEnvelope, ClientFrame};
use super::{PumpExit, notify_client, notify_upstream};
use crate::core::live::UpstreamMessage;
use crate::errors::{ProxyError, ProxyResult};
use crate::metrics::GatewayMetrics;
use crate::registry::ClientConnection;

/// Read client frames in arrival order and forward each one upstream.
///
/// Audio frames (binary, or typed `audio`) are acknowledged with
/// `audio_received` whether or not the forward succeeded. Unrecognized frames
/// are dropped. The pump stops when the client leg ends, when an upstream
/// write fails, or when the connection is closed from outside, including
/// while an upstream write is blocked.
pub async fn run_ingress<R, U>(
    mut client_rx: R,
    upstream_tx: &mut U,
    client: &ClientConnection,
    metrics: &GatewayMetrics,
) -> PumpExit
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    U: Sink<UpstreamFrame> + Unpin,
    U::Error: Display,
{
    let connection_id = client.id();

    loop {
        let next = tokio::select! {
            biased;
            _ = client.closed() => return PumpExit::Cancelled,
            next = client_rx.next() => next,
        };

        let frame = match next {
            Some(Ok(Message::Binary(data))) => {
                trace!(%connection_id, bytes = data.len(), "Binary audio frame");
                ClientFrame::Audio(BASE64_STANDARD.encode(&data))
            }
            Some(Ok(Message::Text(text))) => match ClientFrame::parse(text.as_str()) {
                Some(frame) => frame,
                None => {
                    debug!(%connection_id, "Dropping unrecognized client frame");
                    continue;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None => {
                info!(%connection_id, "Client closed connection");
                notify_upstream(
                    upstream_tx,
                    client,
                    &ClientEnvelope::client_disconnected("client closed connection"),
                )
                .await;
                return PumpExit::ClientClosed;
            }
            Some(Err(e)) => {
                warn!(%connection_id, error = %e, "Client read failed");
                notify_upstream(
                    upstream_tx,
                    client,
                    &ClientEnvelope::client_disconnected(e.to_string()),
                )
                .await;
                return PumpExit::ClientError(e.to_string());
            }
        };

        let needs_ack = frame.needs_ack();
        debug!(%connection_id, kind = frame.kind(), "Forwarding client frame");

        let forwarded = tokio::select! {
            biased;
            _ = client.closed() => return PumpExit::Cancelled,
            result = forward(upstream_tx, frame.into_upstream()) => result,
        };

        let mut upstream_failure = None;
        match forwarded {
            Ok(()) => metrics.record_message(),
            Err(e) if e.is_fatal() => upstream_failure = Some(e),
            Err(e) => {
                metrics.record_error();
                warn!(%connection_id, error = %e, "Dropping client frame");
            }
        }

        if needs_ack {
            notify_client(client, &ClientEnvelope::audio_received()).await;
        }

        if let Some(e) = upstream_failure {
            metrics.record_error();
            warn!(%connection_id, error = %e, "Upstream write failed");
            return PumpExit::UpstreamError(e.to_string());
        }
    }
}

async fn forward<U>(upstream_tx: &mut U, message: UpstreamMessage) -> ProxyResult<()>
where
    U: Sink<UpstreamFrame> + Unpin,
    U::Error: Display,
{
    let json = message
        .to_json()
        .map_err(|e| ProxyError::Parse(e.to_string()))?;
    upstream_tx
        .send(UpstreamFrame::Text(json.into()))
        .await
        .map_err(|e| ProxyError::Socket(e.to_string()))
}
