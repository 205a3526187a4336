//! Connection registry and liveness sweeper.
//!
//! The registry is the only state shared across client connections. Each
//! entry is a [`ClientConnection`]: the write half of one client socket plus a
//! cancellation token that both pumps of that connection watch.
//!
//! The sweeper periodically writes a ping to every registered connection. A
//! ping that fails, or does not complete within the probe timeout, closes the
//! connection and removes it from the registry in the same tick.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, timeout};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{ProxyError, ProxyResult};
use crate::metrics::GatewayMetrics;

/// Bound on the close handshake write during a forced close.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Write half of a client socket.
pub type ClientSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

// =============================================================================
// Client connection handle
// =============================================================================

/// One live client socket, as seen by the pumps and the sweeper.
///
/// Writes are serialized through an async mutex so acknowledgments from the
/// ingress pump, envelopes from the egress pump and sweeper pings never
/// interleave within a frame.
pub struct ClientConnection {
    id: Uuid,
    sink: Mutex<ClientSink>,
    closed: CancellationToken,
}

impl ClientConnection {
    pub fn new<S>(sink: S) -> Arc<Self>
    where
        S: Sink<Message, Error = axum::Error> + Send + 'static,
    {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sink: Mutex::new(Box::pin(sink)),
            closed: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Send one text frame. Fails once the connection has been closed.
    pub async fn send_text(&self, text: impl Into<String>) -> ProxyResult<()> {
        self.send(Message::Text(text.into().into())).await
    }

    /// Send a zero-payload ping.
    pub async fn ping(&self) -> ProxyResult<()> {
        self.send(Message::Ping(Bytes::new())).await
    }

    /// Waiting for the writer lock and the write itself both abort once the
    /// connection is closed, so a peer that stops reading cannot pin a pump.
    async fn send(&self, message: Message) -> ProxyResult<()> {
        let write = async {
            self.sink
                .lock()
                .await
                .send(message)
                .await
                .map_err(|e| ProxyError::Socket(e.to_string()))
        };

        tokio::select! {
            biased;
            _ = self.closed() => Err(ProxyError::Socket("client connection is closed".to_string())),
            result = write => result,
        }
    }

    /// Force-close the connection.
    ///
    /// Cancels the token both pumps select on, which also aborts any write in
    /// flight, then attempts a close handshake if the socket is free.
    /// Idempotent.
    pub async fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();

        let handshake = async { self.sink.lock().await.close().await };
        match timeout(CLOSE_FRAME_TIMEOUT, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(connection_id = %self.id, error = %e, "Close frame not delivered"),
            Err(_) => debug!(connection_id = %self.id, "Close frame timed out"),
        }
    }

    /// Resolves once the connection has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrent set of active client connections, keyed by connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection: Arc<ClientConnection>) {
        self.connections.insert(connection.id(), connection);
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<ClientConnection>> {
        self.connections.remove(id).map(|(_, connection)| connection)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.connections.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Visit every registered connection. No ordering guarantee.
    ///
    /// The callback runs while a shard lock is held; it must not call back
    /// into the registry. Use [`snapshot`](Self::snapshot) for async work.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<ClientConnection>)) {
        for entry in self.connections.iter() {
            f(entry.value());
        }
    }

    /// Clone out every handle so callers can await without holding locks.
    pub fn snapshot(&self) -> Vec<Arc<ClientConnection>> {
        let mut handles = Vec::with_capacity(self.count());
        self.for_each(|connection| handles.push(Arc::clone(connection)));
        handles
    }
}

// =============================================================================
// Liveness sweeper
// =============================================================================

/// Periodic liveness probing over a registry.
pub struct LivenessSweeper {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<GatewayMetrics>,
    interval: Duration,
    probe_timeout: Duration,
}

impl LivenessSweeper {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        metrics: Arc<GatewayMetrics>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            metrics,
            interval,
            probe_timeout,
        }
    }

    /// Probe every registered connection once. Returns the number evicted.
    pub async fn sweep_once(&self) -> usize {
        let connections = self.registry.snapshot();
        info!(active_connections = connections.len(), "Liveness sweep");

        let probes = connections.into_iter().map(|connection| async move {
            let failure = match timeout(self.probe_timeout, connection.ping()).await {
                Ok(Ok(())) => return false,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "probe timed out".to_string(),
            };

            warn!(connection_id = %connection.id(), reason = %failure, "Evicting unresponsive connection");
            connection.close().await;
            self.registry.remove(&connection.id());
            self.metrics.record_eviction();
            true
        });

        join_all(probes).await.into_iter().filter(|evicted| *evicted).count()
    }

    /// Run sweeps until `shutdown` is cancelled. The first sweep happens one
    /// interval after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.sweep_once().await;
                    if evicted > 0 {
                        debug!(evicted, "Liveness sweep evicted connections");
                    }
                }
            }
        }
        debug!("Liveness sweeper stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
