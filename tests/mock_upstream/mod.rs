//! Mock streaming backend and gateway harness
//!
//! The mock speaks the Live API framing: it records every JSON frame the
//! gateway sends and answers `setup` and `client_content` messages from a
//! fixed script.

// Allow dead code in test infrastructure - not every test file uses every helper
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async, tungstenite::Message};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use vertex_live_gateway::core::auth::StaticTokenProvider;
use vertex_live_gateway::core::tts::{GoogleSpeechClient, SharedSynthesizer};
use vertex_live_gateway::{ServerConfig, routes, state::AppState};

pub const TEST_TOKEN: &str = "test-token";
const WAIT: Duration = Duration::from_secs(5);

/// One scripted backend action.
#[derive(Clone, Debug)]
pub enum MockFrame {
    Text(String),
    Close,
}

pub fn frame(value: Value) -> MockFrame {
    MockFrame::Text(value.to_string())
}

pub fn setup_complete() -> MockFrame {
    frame(json!({"setupComplete": {}}))
}

pub fn part(text: &str) -> MockFrame {
    frame(json!({"serverContent": {"modelTurn": {"parts": [{"text": text}]}}}))
}

pub fn turn_complete() -> MockFrame {
    frame(json!({"serverContent": {"turnComplete": true}}))
}

#[derive(Clone, Default)]
pub struct Script {
    pub on_setup: Vec<MockFrame>,
    pub on_turn: Vec<MockFrame>,
}

/// Running mock backend.
pub struct MockUpstream {
    pub url: String,
    received: mpsc::UnboundedReceiver<Value>,
    authorization: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub async fn start(script: Script) -> Self {
        Self::start_with_handshake_delay(script, Duration::ZERO).await
    }

    /// Like [`start`](Self::start), but each WebSocket handshake is held for
    /// `delay` before it is answered.
    pub async fn start_with_handshake_delay(script: Script, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, received) = mpsc::unbounded_channel();
        let authorization = Arc::new(Mutex::new(Vec::new()));

        let auth = Arc::clone(&authorization);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                let script = script.clone();
                let auth = Arc::clone(&auth);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = handle_connection(stream, tx, script, auth).await;
                });
            }
        });

        Self {
            url: format!("ws://{addr}/ws/live"),
            received,
            authorization,
        }
    }

    /// Next JSON frame the gateway sent, in arrival order.
    pub async fn next_received(&mut self) -> Value {
        timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for upstream frame")
            .expect("mock upstream stopped")
    }

    pub fn authorization_headers(&self) -> Vec<String> {
        self.authorization.lock().clone()
    }
}

async fn handle_connection(
    stream: TcpStream,
    tx: mpsc::UnboundedSender<Value>,
    script: Script,
    authorization: Arc<Mutex<Vec<String>>>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if let Some(value) = request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        {
            authorization.lock().push(value.to_string());
        }
        Ok(response)
    };
    let mut ws = accept_hdr_async(stream, callback).await?;

    while let Some(message) = ws.next().await {
        let text = match message? {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(value) = serde_json::from_str::<Value>(&text) else {
            continue;
        };

        let reply = if value.get("setup").is_some() {
            script.on_setup.clone()
        } else if value.get("client_content").is_some() {
            script.on_turn.clone()
        } else {
            Vec::new()
        };
        let _ = tx.send(value);

        for action in reply {
            match action {
                MockFrame::Text(text) => ws.send(Message::Text(text.into())).await?,
                MockFrame::Close => {
                    ws.close(None).await?;
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Speech endpoint
// =============================================================================

/// Speech endpoint answering every request with `audio`.
pub async fn speech_ok(audio: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audioContent": audio})))
        .mount(&server)
        .await;
    server
}

/// Speech endpoint failing every request.
pub async fn speech_failing() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
        .mount(&server)
        .await;
    server
}

// =============================================================================
// Gateway
// =============================================================================

pub fn test_config(service_url: &str, tts_url: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.live.service_url = service_url.to_string();
    config.live.model = "models/gemini-test".to_string();
    config.tts_url = tts_url.to_string();
    config.google_access_token = Some(TEST_TOKEN.to_string());
    config
}

pub fn test_state(config: ServerConfig) -> Arc<AppState> {
    let tokens = Arc::new(StaticTokenProvider::new(TEST_TOKEN));
    let synthesizer: SharedSynthesizer =
        Arc::new(GoogleSpeechClient::new(config.tts_url.clone(), tokens.clone()).unwrap());
    AppState::with_components(config, tokens, synthesizer)
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_gateway(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::create_app_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect_client(addr: SocketAddr) -> ClientSocket {
    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("client should connect");
    socket
}

pub async fn send_json(socket: &mut ClientSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Next client-facing envelope, skipping control frames. `None` once closed.
pub async fn next_envelope(socket: &mut ClientSocket) -> Option<Value> {
    loop {
        let message = timeout(WAIT, socket.next())
            .await
            .expect("timed out waiting for gateway frame");
        match message {
            Some(Ok(Message::Text(text))) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(other)) => panic!("unexpected frame from gateway: {other:?}"),
        }
    }
}

/// Poll until the registry reaches `expected` live connections.
pub async fn wait_for_count(state: &AppState, expected: usize) {
    timeout(WAIT, async {
        while state.registry.count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "registry count stuck at {} (expected {expected})",
            state.registry.count()
        )
    });
}
