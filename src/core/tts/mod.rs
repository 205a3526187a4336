//! Speech synthesis for completed AI turns.

pub mod google;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ProxyResult;

pub use google::{GOOGLE_TTS_URL, GoogleSpeechClient, voice_for_language};

/// Turns text into base64-encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `language_code` (BCP-47, e.g. `en-US`).
    ///
    /// Returns the audio exactly as the backend encoded it (base64 MP3).
    async fn synthesize(&self, text: &str, language_code: &str) -> ProxyResult<String>;
}

/// Shared synthesizer handle.
pub type SharedSynthesizer = Arc<dyn SpeechSynthesizer>;
