//! Vertex AI Live API message types.
//!
//! Outbound (gateway -> backend):
//! - `setup`: sent once, immediately after the socket opens
//! - `client_content`: one complete user turn of text
//! - `realtimeInput`: one media chunk, or the end-of-stream marker
//!
//! Inbound (backend -> gateway) frames are classified into [`UpstreamEvent`]
//! before any client-facing output is produced.

use serde::{Deserialize, Serialize};

use super::config::{LiveSessionConfig, ResponseModality};

/// MIME type of browser-recorded audio chunks.
pub const AUDIO_MIME_TYPE: &str = "audio/webm";

/// MIME type of camera/screenshot frames.
pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

// =============================================================================
// Outbound Messages (Gateway -> Backend)
// =============================================================================

/// Outbound envelope. Serializes as a single-key object named after the variant.
#[derive(Debug, Clone, Serialize)]
pub enum UpstreamMessage {
    #[serde(rename = "setup")]
    Setup(SetupPayload),

    #[serde(rename = "client_content")]
    ClientContent(ClientContent),

    #[serde(rename = "realtimeInput")]
    RealtimeInput(RealtimeInput),
}

impl UpstreamMessage {
    /// Build the one-time session configuration message.
    pub fn setup(config: &LiveSessionConfig) -> Self {
        UpstreamMessage::Setup(SetupPayload {
            model: config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: config.response_modalities.clone(),
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                max_output_tokens: config.max_output_tokens,
            },
            system_instruction: Content {
                role: "system".to_string(),
                parts: vec![TextPart {
                    text: config.system_instruction.clone(),
                }],
            },
        })
    }

    /// A single completed user turn carrying `text`.
    pub fn user_text(text: impl Into<String>) -> Self {
        UpstreamMessage::ClientContent(ClientContent {
            turns: vec![Content {
                role: "user".to_string(),
                parts: vec![TextPart { text: text.into() }],
            }],
            turn_complete: true,
        })
    }

    /// A media chunk with already base64-encoded data.
    pub fn media_chunk(mime_type: &str, data: impl Into<String>) -> Self {
        UpstreamMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: mime_type.to_string(),
                data: data.into(),
            }],
            end_of_stream: None,
        })
    }

    /// The end-of-stream marker closing an audio input stream.
    pub fn end_of_stream() -> Self {
        UpstreamMessage::RealtimeInput(RealtimeInput {
            media_chunks: Vec::new(),
            end_of_stream: Some(true),
        })
    }

    /// Serialize to the JSON text sent on the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Body of the `setup` message.
#[derive(Debug, Clone, Serialize)]
pub struct SetupPayload {
    pub model: String,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

/// A role-tagged list of text parts.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeInput {
    #[serde(rename = "mediaChunks", skip_serializing_if = "Vec::is_empty")]
    pub media_chunks: Vec<MediaChunk>,
    #[serde(rename = "endOfStream", skip_serializing_if = "Option::is_none")]
    pub end_of_stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

// =============================================================================
// Inbound Messages (Backend -> Gateway)
// =============================================================================

/// Structural view of an inbound frame.
///
/// The backend has used both snake_case and camelCase keys. Each spelling is
/// its own field, so a frame carrying both still parses; the accessors merge
/// them.
#[derive(Debug, Default, Deserialize)]
pub struct ServerMessage {
    #[serde(default, rename = "setupComplete")]
    setup_complete: Option<serde_json::Value>,
    #[serde(default, rename = "setup_complete")]
    setup_complete_snake: Option<serde_json::Value>,

    #[serde(default, rename = "server_content")]
    server_content: Option<ServerContent>,
    #[serde(default, rename = "serverContent")]
    server_content_camel: Option<ServerContent>,
}

impl ServerMessage {
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some() || self.setup_complete_snake.is_some()
    }

    /// Server content under either key, folded into one view.
    pub fn into_content(self) -> ServerContent {
        match (self.server_content, self.server_content_camel) {
            (Some(snake), Some(camel)) => snake.merge(camel),
            (snake, camel) => snake.or(camel).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerContent {
    #[serde(default, rename = "turn_complete")]
    turn_complete: bool,
    #[serde(default, rename = "turnComplete")]
    turn_complete_camel: bool,

    #[serde(default, rename = "generation_complete")]
    generation_complete: bool,
    #[serde(default, rename = "generationComplete")]
    generation_complete_camel: bool,

    #[serde(default, rename = "model_turn")]
    model_turn: Option<ModelTurn>,
    #[serde(default, rename = "modelTurn")]
    model_turn_camel: Option<ModelTurn>,
}

impl ServerContent {
    pub fn is_turn_complete(&self) -> bool {
        self.turn_complete || self.turn_complete_camel
    }

    pub fn is_generation_complete(&self) -> bool {
        self.generation_complete || self.generation_complete_camel
    }

    /// The first non-empty model turn, snake_case first.
    pub fn into_model_turn(self) -> Option<ModelTurn> {
        [self.model_turn, self.model_turn_camel]
            .into_iter()
            .flatten()
            .find(|turn| !turn.parts.is_empty())
    }

    fn merge(self, other: ServerContent) -> ServerContent {
        ServerContent {
            turn_complete: self.is_turn_complete() || other.is_turn_complete(),
            turn_complete_camel: false,
            generation_complete: self.is_generation_complete()
                || other.is_generation_complete(),
            generation_complete_camel: false,
            model_turn: self.into_model_turn(),
            model_turn_camel: other.into_model_turn(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ModelPart>,
}

/// One part of a model turn. Non-text parts carry no `text`.
#[derive(Debug, Default, Deserialize)]
pub struct ModelPart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Classification of one inbound frame, in dispatch priority order.
#[derive(Debug, PartialEq)]
pub enum UpstreamEvent {
    /// The backend accepted the `setup` message
    SetupComplete,
    /// The current model turn is finished
    TurnComplete,
    /// Streamed text fragments, in array order
    Parts(Vec<String>),
    /// Generation finished; carries nothing for the client
    GenerationComplete,
    /// Valid JSON of an unrecognized shape, forwarded verbatim
    Passthrough(String),
    /// The frame did not parse
    Malformed(String),
}

impl UpstreamEvent {
    /// Classify a raw inbound frame. The first matching shape wins.
    pub fn classify(raw: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => return UpstreamEvent::Malformed(e.to_string()),
        };
        if !value.is_object() {
            return UpstreamEvent::Malformed("frame is not a JSON object".to_string());
        }
        let message: ServerMessage = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => return UpstreamEvent::Malformed(e.to_string()),
        };

        if message.is_setup_complete() {
            return UpstreamEvent::SetupComplete;
        }

        let content = message.into_content();
        if content.is_turn_complete() {
            return UpstreamEvent::TurnComplete;
        }

        let generation_complete = content.is_generation_complete();
        if let Some(turn) = content.into_model_turn() {
            return UpstreamEvent::Parts(
                turn.parts
                    .into_iter()
                    .map(|p| p.text.unwrap_or_default())
                    .collect(),
            );
        }

        if generation_complete {
            return UpstreamEvent::GenerationComplete;
        }

        UpstreamEvent::Passthrough(raw.to_string())
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamEvent::SetupComplete => "setup_complete",
            UpstreamEvent::TurnComplete => "turn_complete",
            UpstreamEvent::Parts(_) => "parts",
            UpstreamEvent::GenerationComplete => "generation_complete",
            UpstreamEvent::Passthrough(_) => "passthrough",
            UpstreamEvent::Malformed(_) => "malformed",
        }
    }
}
