//! Backend -> client pump.

use futures::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message as UpstreamFrame};
use tracing::{debug, info, trace, warn};

use super::messages::{ClientEnvelope, PROCESSING_ERROR_MESSAGE, TurnBuffer};
use super::{PumpExit, notify_client};
use crate::core::live::UpstreamEvent;
use crate::core::tts::SpeechSynthesizer;
use crate::errors::{ProxyError, ProxyResult};
use crate::metrics::GatewayMetrics;
use crate::registry::ClientConnection;

/// Language used to voice completed turns.
pub const TURN_LANGUAGE: &str = "en-US";

/// Read backend frames in arrival order and translate each into zero or one
/// client envelope.
///
/// Streamed text is accumulated per turn; each partial envelope carries the
/// whole turn so far. On turn completion the text is synthesized once and the
/// buffer is reset. The turn's response time, from its first streamed part
/// until the synthesized reply is ready, feeds the metrics average. Malformed
/// frames produce a `fail` envelope and the pump keeps going. The pump stops
/// when the backend leg ends, when a client write fails, or when the
/// connection is closed from outside.
pub async fn run_egress<S>(
    mut upstream_rx: S,
    client: &ClientConnection,
    synthesizer: &dyn SpeechSynthesizer,
    provider_name: &str,
    metrics: &GatewayMetrics,
) -> PumpExit
where
    S: Stream<Item = Result<UpstreamFrame, tungstenite::Error>> + Unpin,
{
    let connection_id = client.id();
    let mut buffer = TurnBuffer::new();
    // First frame of the turn in progress; response time runs from here
    let mut turn_started: Option<Instant> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = client.closed() => return PumpExit::Cancelled,
            next = upstream_rx.next() => next,
        };

        let event = match &next {
            Some(Ok(UpstreamFrame::Text(text))) => {
                trace!(%connection_id, frame = %text.as_str(), "Upstream frame");
                UpstreamEvent::classify(text.as_str())
            }
            Some(Ok(UpstreamFrame::Binary(data))) => match std::str::from_utf8(data) {
                Ok(text) => {
                    trace!(%connection_id, frame = %text, "Upstream binary frame");
                    UpstreamEvent::classify(text)
                }
                Err(e) => UpstreamEvent::Malformed(e.to_string()),
            },
            Some(Ok(UpstreamFrame::Ping(_) | UpstreamFrame::Pong(_) | UpstreamFrame::Frame(_))) => {
                continue;
            }
            Some(Ok(UpstreamFrame::Close(frame))) => {
                let reason = frame
                    .as_ref()
                    .map(|f| format!("closed by server ({})", f.code))
                    .unwrap_or_else(|| "closed by server".to_string());
                info!(%connection_id, %reason, "Upstream closed connection");
                notify_connection_lost(client, &reason).await;
                return PumpExit::UpstreamClosed;
            }
            None => {
                info!(%connection_id, "Upstream stream ended");
                notify_connection_lost(client, "stream ended").await;
                return PumpExit::UpstreamClosed;
            }
            Some(Err(e)) => {
                warn!(%connection_id, error = %e, "Upstream read failed");
                metrics.record_error();
                notify_connection_lost(client, &e.to_string()).await;
                return PumpExit::UpstreamError(e.to_string());
            }
        };

        debug!(%connection_id, kind = event.kind(), "Upstream event");

        let sent = match event {
            UpstreamEvent::SetupComplete => {
                send(client, &ClientEnvelope::ready(provider_name)).await
            }
            UpstreamEvent::TurnComplete => {
                let started = turn_started.take().unwrap_or_else(Instant::now);
                let response = buffer.take();
                let synthesized = tokio::select! {
                    biased;
                    _ = client.closed() => return PumpExit::Cancelled,
                    result = synthesizer.synthesize(&response, TURN_LANGUAGE) => result,
                };
                let audio = match synthesized {
                    Ok(audio) => Some(audio),
                    Err(e) => {
                        warn!(%connection_id, error = %e, "Speech synthesis failed, sending text only");
                        metrics.record_error();
                        None
                    }
                };
                metrics.record_response_time(started.elapsed());
                send(client, &ClientEnvelope::success(response, audio)).await
            }
            UpstreamEvent::Parts(parts) => {
                turn_started.get_or_insert_with(Instant::now);
                let partial = buffer.extend(&parts).to_string();
                send(client, &ClientEnvelope::streaming(partial)).await
            }
            UpstreamEvent::GenerationComplete => Ok(()),
            UpstreamEvent::Passthrough(raw) => client.send_text(raw).await,
            UpstreamEvent::Malformed(e) => {
                warn!(%connection_id, error = %e, "Malformed upstream frame");
                metrics.record_error();
                send(client, &ClientEnvelope::fail(500, PROCESSING_ERROR_MESSAGE)).await
            }
        };

        match sent {
            Ok(()) => metrics.record_message(),
            Err(_) if client.is_closed() => return PumpExit::Cancelled,
            Err(e) => {
                warn!(%connection_id, error = %e, "Client write failed");
                metrics.record_error();
                return PumpExit::ClientError(e.to_string());
            }
        }
    }
}

async fn send(client: &ClientConnection, envelope: &ClientEnvelope) -> ProxyResult<()> {
    let json = envelope
        .to_json()
        .map_err(|e| ProxyError::Parse(e.to_string()))?;
    client.send_text(json).await
}

async fn notify_connection_lost(client: &ClientConnection, reason: &str) {
    notify_client(
        client,
        &ClientEnvelope::fail(500, format!("Connection to AI service lost: {reason}")),
    )
    .await;
}
