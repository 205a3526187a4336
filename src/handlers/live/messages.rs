//! Client WebSocket message types
//!
//! Inbound text frames are either typed, `{"type": "...", "content": "..."}`,
//! or the shorthand `{"text": "..."}`. Binary frames are raw audio.
//!
//! Every outbound frame is a [`ClientEnvelope`].

use serde::{Deserialize, Serialize};

use crate::core::live::UpstreamMessage;
use crate::core::live::messages::{AUDIO_MIME_TYPE, IMAGE_MIME_TYPE};

/// Status literal for successful responses
pub const STATUS_SUCCESS: &str = "success";
/// Status literal for partial streaming responses
pub const STATUS_STREAMING: &str = "streaming";
/// Status literal for failures
pub const STATUS_FAIL: &str = "fail";
/// Status literal for audio acknowledgments
pub const STATUS_AUDIO_RECEIVED: &str = "audio_received";

/// Message shown to the client once the backend accepts the session
pub const READY_MESSAGE: &str = "AI Assistant Ready";
/// Message sent when an upstream frame could not be parsed
pub const PROCESSING_ERROR_MESSAGE: &str = "Error processing AI response";

// =============================================================================
// Incoming Messages (Client -> Gateway)
// =============================================================================

/// A recognized client text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// One user turn of text
    Text(String),
    /// Base64 audio chunk; acknowledged
    Audio(String),
    /// End of the current audio stream
    AudioEnd,
    /// Base64 JPEG frame
    Image(String),
}

/// Typed form of a client text frame.
#[derive(Debug, Deserialize)]
struct TypedFrame {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: String,
}

impl ClientFrame {
    /// Parse a client text frame. `None` means the frame is dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).ok()?;

        // Shorthand takes precedence over any `type` field
        if let Some(text) = value.get("text").and_then(|t| t.as_str()) {
            return Some(ClientFrame::Text(text.to_string()));
        }

        if !value.is_object() {
            return None;
        }
        let typed: TypedFrame = serde_json::from_value(value).ok()?;

        match typed.kind.as_str() {
            "audio_end" => Some(ClientFrame::AudioEnd),
            _ if typed.content.is_empty() => None,
            "text" => Some(ClientFrame::Text(typed.content)),
            "audio" => Some(ClientFrame::Audio(typed.content)),
            "image" => Some(ClientFrame::Image(typed.content)),
            _ => None,
        }
    }

    /// Whether the client expects an `audio_received` acknowledgment.
    pub fn needs_ack(&self) -> bool {
        matches!(self, ClientFrame::Audio(_))
    }

    /// Translate to the upstream wire message.
    pub fn into_upstream(self) -> UpstreamMessage {
        match self {
            ClientFrame::Text(text) => UpstreamMessage::user_text(text),
            ClientFrame::Audio(data) => UpstreamMessage::media_chunk(AUDIO_MIME_TYPE, data),
            ClientFrame::AudioEnd => UpstreamMessage::end_of_stream(),
            ClientFrame::Image(data) => UpstreamMessage::media_chunk(IMAGE_MIME_TYPE, data),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::Text(_) => "text",
            ClientFrame::Audio(_) => "audio",
            ClientFrame::AudioEnd => "audio_end",
            ClientFrame::Image(_) => "image",
        }
    }
}

// =============================================================================
// Outgoing Messages (Gateway -> Client)
// =============================================================================

/// Status envelope sent to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientEnvelope {
    pub status: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,
}

impl ClientEnvelope {
    fn new(status: impl Into<String>, code: u16) -> Self {
        Self {
            status: status.into(),
            code,
            message: None,
            response: None,
            audio: None,
            partial: None,
        }
    }

    /// Session ready: `connected to <provider>`.
    pub fn ready(provider: &str) -> Self {
        Self {
            message: Some(READY_MESSAGE.to_string()),
            ..Self::new(format!("connected to {provider}"), 200)
        }
    }

    pub fn audio_received() -> Self {
        Self::new(STATUS_AUDIO_RECEIVED, 200)
    }

    /// Full text accumulated so far in the current turn.
    pub fn streaming(partial: impl Into<String>) -> Self {
        Self {
            partial: Some(partial.into()),
            ..Self::new(STATUS_STREAMING, 200)
        }
    }

    /// Completed turn, with audio when synthesis succeeded.
    pub fn success(response: impl Into<String>, audio: Option<String>) -> Self {
        Self {
            response: Some(response.into()),
            audio,
            ..Self::new(STATUS_SUCCESS, 200)
        }
    }

    pub fn fail(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(STATUS_FAIL, code)
        }
    }

    /// Notice written upstream when the client leg drops.
    pub fn client_disconnected(reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::new("fail connect to websocket", 500)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Turn buffer
// =============================================================================

/// Text accumulated for the current model turn. Owned by one egress pump.
#[derive(Debug, Default)]
pub struct TurnBuffer {
    text: String,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append parts in order and return the snapshot so far.
    pub fn extend<I, S>(&mut self, parts: I) -> &str
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for part in parts {
            self.text.push_str(part.as_ref());
        }
        &self.text
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Take the completed turn, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn to_value(envelope: &ClientEnvelope) -> Value {
        serde_json::from_str(&envelope.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_typed_frames() {
        assert_eq!(
            ClientFrame::parse(r#"{"type":"text","content":"hello"}"#),
            Some(ClientFrame::Text("hello".to_string()))
        );
        assert_eq!(
            ClientFrame::parse(r#"{"type":"audio","content":"AAEC"}"#),
            Some(ClientFrame::Audio("AAEC".to_string()))
        );
        assert_eq!(
            ClientFrame::parse(r#"{"type":"image","content":"/9j/"}"#),
            Some(ClientFrame::Image("/9j/".to_string()))
        );
        assert_eq!(
            ClientFrame::parse(r#"{"type":"audio_end","content":""}"#),
            Some(ClientFrame::AudioEnd)
        );
        assert_eq!(
            ClientFrame::parse(r#"{"type":"audio_end"}"#),
            Some(ClientFrame::AudioEnd)
        );
    }

    #[test]
    fn test_parse_shorthand() {
        assert_eq!(
            ClientFrame::parse(r#"{"text":"hi there"}"#),
            Some(ClientFrame::Text("hi there".to_string()))
        );
        // Shorthand wins even when a type is present
        assert_eq!(
            ClientFrame::parse(r#"{"type":"audio","content":"AAEC","text":"hi"}"#),
            Some(ClientFrame::Text("hi".to_string()))
        );
    }

    #[test]
    fn test_parse_dropped_frames() {
        assert_eq!(ClientFrame::parse("not json"), None);
        assert_eq!(ClientFrame::parse("[1,2,3]"), None);
        assert_eq!(ClientFrame::parse(r#""text""#), None);
        assert_eq!(ClientFrame::parse(r#"{}"#), None);
        assert_eq!(ClientFrame::parse(r#"{"type":"text","content":""}"#), None);
        assert_eq!(ClientFrame::parse(r#"{"type":"audio"}"#), None);
        assert_eq!(ClientFrame::parse(r#"{"type":"video","content":"x"}"#), None);
        assert_eq!(ClientFrame::parse(r#"{"type":"text","content":42}"#), None);
        // Non-string shorthand falls through to typed handling
        assert_eq!(ClientFrame::parse(r#"{"text":5}"#), None);
    }

    #[test]
    fn test_into_upstream() {
        let json = ClientFrame::AudioEnd.into_upstream().to_json().unwrap();
        assert_eq!(json, r#"{"realtimeInput":{"endOfStream":true}}"#);

        let value: Value = serde_json::from_str(
            &ClientFrame::Image("/9j/".to_string())
                .into_upstream()
                .to_json()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(value["realtimeInput"]["mediaChunks"][0]["mime_type"], "image/jpeg");

        let text = "quote \" backslash \\ emoji 🎉";
        let value: Value = serde_json::from_str(
            &ClientFrame::parse(&json!({"type": "text", "content": text}).to_string())
                .unwrap()
                .into_upstream()
                .to_json()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(value["client_content"]["turns"][0]["parts"][0]["text"], text);
    }

    #[test]
    fn test_needs_ack() {
        assert!(ClientFrame::Audio("x".to_string()).needs_ack());
        assert!(!ClientFrame::AudioEnd.needs_ack());
        assert!(!ClientFrame::Image("x".to_string()).needs_ack());
        assert!(!ClientFrame::Text("x".to_string()).needs_ack());
    }

    #[test]
    fn test_envelope_shapes() {
        assert_eq!(
            to_value(&ClientEnvelope::ready("Vertex AI")),
            json!({"status": "connected to Vertex AI", "code": 200, "message": "AI Assistant Ready"})
        );
        assert_eq!(
            to_value(&ClientEnvelope::audio_received()),
            json!({"status": "audio_received", "code": 200})
        );
        assert_eq!(
            to_value(&ClientEnvelope::streaming("Hel")),
            json!({"status": "streaming", "code": 200, "partial": "Hel"})
        );
        assert_eq!(
            to_value(&ClientEnvelope::success("Hello", Some("QUJD".to_string()))),
            json!({"status": "success", "code": 200, "response": "Hello", "audio": "QUJD"})
        );
        assert_eq!(
            to_value(&ClientEnvelope::success("Hello", None)),
            json!({"status": "success", "code": 200, "response": "Hello"})
        );
        assert_eq!(
            to_value(&ClientEnvelope::fail(500, PROCESSING_ERROR_MESSAGE)),
            json!({"status": "fail", "code": 500, "message": "Error processing AI response"})
        );
    }

    #[test]
    fn test_turn_buffer() {
        let mut buffer = TurnBuffer::new();
        assert_eq!(buffer.extend(["Hel"]), "Hel");
        assert_eq!(buffer.extend(["l", "", "o"]), "Hello");
        assert_eq!(buffer.take(), "Hello");
        assert!(buffer.is_empty());
        assert_eq!(buffer.as_str(), "");
    }
}
