//! Google Cloud Text-to-Speech client.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://texttospeech.googleapis.com/v1/text:synthesize`
//! - Auth: OAuth2 bearer token
//! - Output: base64 `audioContent` in the requested encoding

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::SpeechSynthesizer;
use crate::core::auth::SharedTokenProvider;
use crate::errors::{ProxyError, ProxyResult};

/// Google Cloud Text-to-Speech synthesis endpoint
pub const GOOGLE_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

const AUDIO_ENCODING: &str = "MP3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Voice used for a language tag. Unlisted tags use the backend default voice.
pub fn voice_for_language(language_code: &str) -> Option<&'static str> {
    match language_code {
        "en-US" => Some("en-US-Wavenet-D"),
        "id-ID" => Some("id-ID-Wavenet-A"),
        _ => None,
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct VoiceSelection<'a> {
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct AudioConfig {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent", default)]
    audio_content: String,
}

// =============================================================================
// Client
// =============================================================================

/// One-shot synthesis client. Each call fetches a fresh bearer token.
pub struct GoogleSpeechClient {
    client: Client,
    url: String,
    tokens: SharedTokenProvider,
}

impl GoogleSpeechClient {
    pub fn new(url: impl Into<String>, tokens: SharedTokenProvider) -> ProxyResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProxyError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            tokens,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechClient {
    async fn synthesize(&self, text: &str, language_code: &str) -> ProxyResult<String> {
        let token = self.tokens.access_token().await?;

        let body = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code,
                name: voice_for_language(language_code),
            },
            audio_config: AudioConfig {
                audio_encoding: AUDIO_ENCODING,
            },
        };

        debug!(
            text_len = text.len(),
            language = language_code,
            "Synthesizing turn with Google TTS"
        );

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {token}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Google TTS request failed");
                ProxyError::Synthesis(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Synthesis(format!(
                "text-to-speech API error ({status}): {body}"
            )));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| ProxyError::Synthesis(format!("invalid response body: {e}")))?;

        debug!(audio_len = parsed.audio_content.len(), "Google TTS audio received");
        Ok(parsed.audio_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::StaticTokenProvider;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GoogleSpeechClient {
        GoogleSpeechClient::new(
            format!("{}/v1/text:synthesize", server.uri()),
            Arc::new(StaticTokenProvider::new("tts-token")),
        )
        .unwrap()
    }

    #[test]
    fn test_voice_table() {
        assert_eq!(voice_for_language("en-US"), Some("en-US-Wavenet-D"));
        assert_eq!(voice_for_language("id-ID"), Some("id-ID-Wavenet-A"));
        assert_eq!(voice_for_language("fr-FR"), None);
    }

    #[test]
    fn test_request_body_omits_unknown_voice() {
        let body = SynthesizeRequest {
            input: SynthesisInput { text: "bonjour" },
            voice: VoiceSelection {
                language_code: "fr-FR",
                name: voice_for_language("fr-FR"),
            },
            audio_config: AudioConfig {
                audio_encoding: AUDIO_ENCODING,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "input": {"text": "bonjour"},
                "voice": {"languageCode": "fr-FR"},
                "audioConfig": {"audioEncoding": "MP3"}
            })
        );
    }

    #[tokio::test]
    async fn test_synthesize_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text:synthesize"))
            .and(header("Authorization", "Bearer tts-token"))
            .and(body_json(json!({
                "input": {"text": "Hello"},
                "voice": {"languageCode": "en-US", "name": "en-US-Wavenet-D"},
                "audioConfig": {"audioEncoding": "MP3"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audioContent": "QUJD"})))
            .expect(1)
            .mount(&server)
            .await;

        let audio = client_for(&server).synthesize("Hello", "en-US").await.unwrap();
        assert_eq!(audio, "QUJD");
    }

    #[tokio::test]
    async fn test_synthesize_empty_text_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "input": {"text": ""},
                "voice": {"languageCode": "id-ID", "name": "id-ID-Wavenet-A"},
                "audioConfig": {"audioEncoding": "MP3"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"audioContent": ""})))
            .expect(1)
            .mount(&server)
            .await;

        let audio = client_for(&server).synthesize("", "id-ID").await.unwrap();
        assert_eq!(audio, "");
    }

    #[tokio::test]
    async fn test_synthesize_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        match client_for(&server).synthesize("Hello", "en-US").await {
            Err(ProxyError::Synthesis(msg)) => assert!(msg.contains("permission denied")),
            other => panic!("Expected synthesis error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_synthesize_credential_failure() {
        let server = MockServer::start().await;
        let client = GoogleSpeechClient::new(
            format!("{}/v1/text:synthesize", server.uri()),
            Arc::new(StaticTokenProvider::new("")),
        )
        .unwrap();

        assert!(matches!(
            client.synthesize("Hello", "en-US").await,
            Err(ProxyError::Credential(_))
        ));
    }
}
