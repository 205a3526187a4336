//! Error types shared by the proxy engine.
//!
//! Each variant maps to one failure class of the gateway and carries its own
//! disposition:
//!
//! - `Credential` / `Connect` are fatal to session establishment; the client
//!   socket is closed without a registry entry being created.
//! - `Parse` is recovered locally by the pump that hit it.
//! - `Synthesis` degrades a completed turn to a text-only response.
//! - `Socket` terminates the pump that owns the failing leg.

use thiserror::Error;

/// Errors produced by the gateway.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// A bearer token could not be obtained
    #[error("Credential error: {0}")]
    Credential(String),

    /// The upstream streaming endpoint could not be reached
    #[error("Connect error: {0}")]
    Connect(String),

    /// A frame on either leg could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The speech synthesis call failed
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// A read or write on a WebSocket failed
    #[error("Socket error: {0}")]
    Socket(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProxyError {
    /// Whether this error ends the connection that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProxyError::Credential(_) | ProxyError::Connect(_) | ProxyError::Socket(_)
        )
    }
}

/// Result type for gateway operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProxyError::Synthesis("TTS API error: quota".to_string());
        assert_eq!(err.to_string(), "Synthesis error: TTS API error: quota");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ProxyError::Credential("no adc".into()).is_fatal());
        assert!(ProxyError::Connect("refused".into()).is_fatal());
        assert!(ProxyError::Socket("reset".into()).is_fatal());
        assert!(!ProxyError::Parse("eof".into()).is_fatal());
        assert!(!ProxyError::Synthesis("500".into()).is_fatal());
        assert!(!ProxyError::Config("port".into()).is_fatal());
    }
}
