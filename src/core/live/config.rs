//! Vertex AI Live API configuration types.
//!
//! This module contains the settings sent to the backend in the one-time
//! `setup` message:
//! - Model resource name
//! - Generation parameters
//! - Response modalities
//! - System instruction

use serde::{Deserialize, Serialize};

/// Vertex AI host serving the bidirectional streaming endpoint.
pub const VERTEX_AI_HOST: &str = "us-central1-aiplatform.googleapis.com";

/// Vertex AI Live API WebSocket endpoint.
pub const VERTEX_LIVE_URL: &str = "wss://us-central1-aiplatform.googleapis.com/ws/google.cloud.aiplatform.v1beta1.LlmBidiService/BidiGenerateContent";

/// Default model resource name.
pub const DEFAULT_MODEL: &str = "projects/our-service-454404-j3/locations/us-central1/publishers/google/models/gemini-2.0-flash-exp";

/// Default system instruction for the assistant.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful, friendly AI assistant. You can understand both text and voice inputs in multiple languages including English and Indonesian. Respond in a conversational, helpful manner. Keep your responses concise and engaging.";

/// Name announced to clients in the ready envelope.
pub const DEFAULT_PROVIDER_NAME: &str = "Vertex AI";

// =============================================================================
// Modalities
// =============================================================================

/// Response modalities the backend can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    /// Text parts under `model_turn.parts[]`
    #[default]
    Text,
    /// Inline audio parts
    Audio,
}

impl ResponseModality {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Audio => "AUDIO",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "AUDIO" => Self::Audio,
            _ => Self::Text,
        }
    }
}

impl std::fmt::Display for ResponseModality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Session configuration
// =============================================================================

/// Settings for one upstream streaming session.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSessionConfig {
    /// Provider name shown to clients ("connected to <provider>")
    pub provider_name: String,
    /// WebSocket endpoint of the streaming backend
    pub service_url: String,
    /// Model resource name
    pub model: String,
    /// Sampling temperature (0.0 to 2.0)
    pub temperature: f32,
    /// Nucleus sampling probability (0.0 to 1.0)
    pub top_p: f32,
    /// Top-k sampling
    pub top_k: u32,
    /// Upper bound on generated tokens per turn
    pub max_output_tokens: u32,
    /// Modalities requested from the backend
    pub response_modalities: Vec<ResponseModality>,
    /// System instruction text
    pub system_instruction: String,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            service_url: VERTEX_LIVE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 2048,
            response_modalities: vec![ResponseModality::Text],
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl LiveSessionConfig {
    /// Check generation parameters against the ranges the backend accepts.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(format!(
                "top_p must be between 0.0 and 1.0, got {}",
                self.top_p
            ));
        }
        if self.top_k == 0 {
            return Err("top_k must be at least 1".to_string());
        }
        if self.response_modalities.is_empty() {
            return Err("at least one response modality is required".to_string());
        }
        url::Url::parse(&self.service_url)
            .map_err(|e| format!("invalid service_url '{}': {e}", self.service_url))?;
        Ok(())
    }
}
