use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ServerConfig;
use crate::core::auth::{SharedTokenProvider, token_provider_for};
use crate::core::live::UpstreamConnector;
use crate::core::tts::{GoogleSpeechClient, SharedSynthesizer};
use crate::errors::ProxyResult;
use crate::metrics::GatewayMetrics;
use crate::registry::ConnectionRegistry;

/// Why a WebSocket session was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionLimitError {
    #[error("global connection limit reached")]
    GlobalLimitReached,
}

/// One reserved session slot.
///
/// Taken by the connection limit middleware before the upgrade and carried
/// into the session as a request extension. The slot is released when the
/// last clone drops, whether the upgrade failed or the session ended.
#[derive(Debug, Clone)]
pub struct ConnectionSlot(Arc<SlotRelease>);

#[derive(Debug)]
struct SlotRelease(Arc<AtomicUsize>);

impl Drop for SlotRelease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Application state shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub connector: UpstreamConnector,
    pub synthesizer: SharedSynthesizer,
    pub metrics: Arc<GatewayMetrics>,
    /// Sessions admitted and not yet finished, including ones still upgrading
    reserved: Arc<AtomicUsize>,
}

impl AppState {
    /// Build state from configuration, resolving credentials once.
    pub fn new(config: ServerConfig) -> ProxyResult<Arc<Self>> {
        let tokens = token_provider_for(config.google_access_token.as_deref())?;
        let synthesizer: SharedSynthesizer =
            Arc::new(GoogleSpeechClient::new(config.tts_url.clone(), tokens.clone())?);
        Ok(Self::with_components(config, tokens, synthesizer))
    }

    /// Build state around an explicit token provider and synthesizer.
    pub fn with_components(
        config: ServerConfig,
        tokens: SharedTokenProvider,
        synthesizer: SharedSynthesizer,
    ) -> Arc<Self> {
        let connector = UpstreamConnector::new(config.live.clone(), tokens);
        Arc::new(Self {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            connector,
            synthesizer,
            metrics: Arc::new(GatewayMetrics::new()),
            reserved: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn provider_name(&self) -> &str {
        &self.config.live.provider_name
    }

    /// Atomically reserve a session slot if fewer than `max_connections` are
    /// held.
    pub fn try_acquire_connection(&self) -> Result<ConnectionSlot, ConnectionLimitError> {
        let max = self.config.max_connections;
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                (held < max).then_some(held + 1)
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;
        Ok(ConnectionSlot(Arc::new(SlotRelease(Arc::clone(&self.reserved)))))
    }

    /// Slots currently held.
    pub fn reserved_connections(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }
}
