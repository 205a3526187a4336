pub mod auth;
pub mod live;
pub mod tts;

// Re-export commonly used types for convenience
pub use auth::{SharedTokenProvider, StaticTokenProvider, TokenProvider, token_provider_for};
pub use live::{LiveSessionConfig, UpstreamConnector, UpstreamEvent, UpstreamMessage};
pub use tts::{GoogleSpeechClient, SharedSynthesizer, SpeechSynthesizer};
