//! Configuration module for the Vertex Live Gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading and overrides
//!
//! # Example
//! ```rust,no_run
//! use vertex_live_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::live::LiveSessionConfig;
use crate::core::tts::GOOGLE_TTS_URL;

mod env;
mod yaml;

pub use yaml::YamlConfig;

/// Default interval between liveness sweeps
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Default bound on a single liveness probe write
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Certificate and key for serving `wss://`
#[derive(Debug, Clone, PartialEq)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS, logging)
/// - Security settings (CORS, rate limiting)
/// - Connection registry settings (capacity, sweep interval)
/// - Upstream session settings (endpoint, model, generation parameters)
/// - Speech synthesis endpoint
/// - Credentials
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Log filter used when RUST_LOG is not set
    pub log_level: String,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: u32,

    // Connection registry
    /// Maximum concurrently registered client connections
    pub max_connections: usize,
    /// Interval between liveness sweeps
    pub cleanup_interval: Duration,
    /// Bound on a single liveness probe write
    pub probe_timeout: Duration,

    // Upstream
    pub live: LiveSessionConfig,

    /// Speech synthesis endpoint
    pub tts_url: String,

    /// Static bearer token. When unset, Application Default Credentials are used.
    pub google_access_token: Option<String>,
}

/// Zeroize the access token when the config is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut token) = self.google_access_token {
            token.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8081,
            tls: None,
            log_level: "info".to_string(),
            cors_allowed_origins: Some("*".to_string()),
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_connections: 100,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            live: LiveSessionConfig::default(),
            tts_url: GOOGLE_TTS_URL.to_string(),
            google_access_token: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables on top of defaults.
    ///
    /// The .env file is loaded in main.rs at application startup, so its values
    /// are already visible as environment variables here.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the environment layer, then overlay every key present in the
    /// YAML file at `path`.
    ///
    /// Fails when the file is unreadable or malformed, when an environment
    /// value does not parse, or when the merged result does not validate.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;

        let mut config = env::load()?;
        yaml_config.apply_to(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Listen address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Validate the merged configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be non-zero".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        if self.cleanup_interval.is_zero() {
            return Err("cleanup interval must be greater than zero".to_string());
        }
        if self.probe_timeout.is_zero() {
            return Err("probe timeout must be greater than zero".to_string());
        }
        if self.rate_limit_requests_per_second == 0 {
            return Err("rate_limit_requests_per_second must be at least 1".to_string());
        }
        url::Url::parse(&self.tts_url)
            .map_err(|e| format!("invalid tts_url '{}': {e}", self.tts_url))?;
        if let Some(tls) = &self.tls
            && (tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty())
        {
            return Err("TLS requires both cert_path and key_path".to_string());
        }
        self.live.validate()
    }
}
