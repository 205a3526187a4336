//! Upstream session establishment.

use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::{debug, info};

use super::config::LiveSessionConfig;
use super::messages::UpstreamMessage;
use crate::core::auth::SharedTokenProvider;
use crate::errors::{ProxyError, ProxyResult};

/// An open, configured upstream socket.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens authenticated streaming sessions against the backend.
pub struct UpstreamConnector {
    config: LiveSessionConfig,
    tokens: SharedTokenProvider,
}

impl UpstreamConnector {
    pub fn new(config: LiveSessionConfig, tokens: SharedTokenProvider) -> Self {
        Self { config, tokens }
    }

    pub fn config(&self) -> &LiveSessionConfig {
        &self.config
    }

    /// Open a session: fetch a bearer token, dial the backend, send `setup`.
    ///
    /// The setup message is written exactly once. On any failure no socket is
    /// returned and nothing is left open.
    pub async fn connect(&self) -> ProxyResult<UpstreamSocket> {
        let token = self.tokens.access_token().await?;

        let request = build_request(&self.config.service_url, &token)?;

        let (mut socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ProxyError::Connect(format!("failed to connect to Vertex AI: {e}")))?;

        debug!(url = %self.config.service_url, "Upstream socket open");

        let setup = UpstreamMessage::setup(&self.config)
            .to_json()
            .map_err(|e| ProxyError::Parse(e.to_string()))?;

        if let Err(e) = socket.send(tungstenite::Message::Text(setup.into())).await {
            let _ = socket.close(None).await;
            return Err(ProxyError::Connect(format!(
                "failed to send setup message: {e}"
            )));
        }

        info!(model = %self.config.model, "Upstream session configured");
        Ok(socket)
    }
}

/// Build the upgrade request carrying the bearer token.
fn build_request(service_url: &str, token: &str) -> ProxyResult<http::Request<()>> {
    let url = url::Url::parse(service_url)
        .map_err(|e| ProxyError::Connect(format!("invalid service url '{service_url}': {e}")))?;

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => {
            return Err(ProxyError::Connect(format!(
                "service url '{service_url}' has no host"
            )));
        }
    };

    http::Request::builder()
        .uri(url.as_str())
        .header("Authorization", format!("Bearer {token}"))
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", host)
        .body(())
        .map_err(|e| ProxyError::Connect(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::StaticTokenProvider;
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[test]
    fn test_build_request_headers() {
        let request = build_request("ws://127.0.0.1:9000/live", "tok").unwrap();
        assert_eq!(request.headers()["Authorization"], "Bearer tok");
        assert_eq!(request.headers()["Host"], "127.0.0.1:9000");
        assert_eq!(request.headers()["Upgrade"], "websocket");
    }

    #[test]
    fn test_build_request_default_port_host() {
        let request = build_request(super::super::config::VERTEX_LIVE_URL, "tok").unwrap();
        assert_eq!(
            request.headers()["Host"],
            super::super::config::VERTEX_AI_HOST
        );
    }

    #[test]
    fn test_build_request_invalid_url() {
        assert!(matches!(
            build_request("not a url", "tok"),
            Err(ProxyError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_sends_setup_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut frames = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    tungstenite::Message::Text(text) => frames.push(text.as_str().to_owned()),
                    tungstenite::Message::Close(_) => break,
                    _ => {}
                }
            }
            frames
        });

        let config = LiveSessionConfig {
            service_url: format!("ws://{addr}/live"),
            model: "models/test".to_string(),
            ..Default::default()
        };
        let connector = UpstreamConnector::new(config, Arc::new(StaticTokenProvider::new("tok")));

        let mut socket = connector.connect().await.expect("should connect");
        let _ = socket.close(None).await;

        let frames = server.await.unwrap();
        assert_eq!(frames.len(), 1);
        let setup: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(setup["setup"]["model"], "models/test");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = LiveSessionConfig {
            service_url: format!("ws://{addr}/live"),
            ..Default::default()
        };
        let connector = UpstreamConnector::new(config, Arc::new(StaticTokenProvider::new("tok")));

        assert!(matches!(
            connector.connect().await,
            Err(ProxyError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_credential_failure() {
        let connector = UpstreamConnector::new(
            LiveSessionConfig::default(),
            Arc::new(StaticTokenProvider::new("")),
        );
        assert!(matches!(
            connector.connect().await,
            Err(ProxyError::Credential(_))
        ));
    }
}
