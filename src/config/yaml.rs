use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::{ServerConfig, TlsConfig};
use crate::core::live::ResponseModality;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in the
/// file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8081
///   tls:
///     cert_path: "/etc/certs/cert.pem"
///     key_path: "/etc/certs/key.pem"
///
/// logging:
///   level: "debug"
///
/// security:
///   cors_allowed_origins: "https://chat.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///
/// connections:
///   max_connections: 100
///   cleanup_interval_seconds: 30
///   probe_timeout_seconds: 5
///
/// upstream:
///   provider_name: "Vertex AI"
///   service_url: "wss://us-central1-aiplatform.googleapis.com/ws/..."
///   model: "projects/p/locations/us-central1/publishers/google/models/gemini-2.0-flash-exp"
///   temperature: 0.7
///   top_p: 0.95
///   top_k: 40
///   max_output_tokens: 2048
///   response_modalities: ["TEXT"]
///   system_instruction: "You are a helpful assistant."
///
/// tts:
///   url: "https://texttospeech.googleapis.com/v1/text:synthesize"
///
/// credentials:
///   access_token: "ya29...."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub logging: Option<LoggingYaml>,
    pub security: Option<SecurityYaml>,
    pub connections: Option<ConnectionsYaml>,
    pub upstream: Option<UpstreamYaml>,
    pub tts: Option<TtsYaml>,
    pub credentials: Option<CredentialsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYaml {
    pub level: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
}

/// Connection registry configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConnectionsYaml {
    pub max_connections: Option<usize>,
    pub cleanup_interval_seconds: Option<u64>,
    pub probe_timeout_seconds: Option<u64>,
}

/// Upstream session configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub provider_name: Option<String>,
    pub service_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_output_tokens: Option<u32>,
    pub response_modalities: Option<Vec<String>>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsYaml {
    pub access_token: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;
        Ok(config)
    }

    /// Apply every value present in the file over `config`.
    pub fn apply_to(self, config: &mut ServerConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(tls) = server.tls {
                config.tls = Some(TlsConfig {
                    cert_path: PathBuf::from(tls.cert_path.unwrap_or_default()),
                    key_path: PathBuf::from(tls.key_path.unwrap_or_default()),
                });
            }
        }

        if let Some(level) = self.logging.and_then(|l| l.level) {
            config.log_level = level;
        }

        if let Some(security) = self.security {
            if let Some(origins) = security.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
            if let Some(rps) = security.rate_limit_requests_per_second {
                config.rate_limit_requests_per_second = rps;
            }
            if let Some(burst) = security.rate_limit_burst_size {
                config.rate_limit_burst_size = burst;
            }
        }

        if let Some(connections) = self.connections {
            if let Some(max) = connections.max_connections {
                config.max_connections = max;
            }
            if let Some(secs) = connections.cleanup_interval_seconds {
                config.cleanup_interval = Duration::from_secs(secs);
            }
            if let Some(secs) = connections.probe_timeout_seconds {
                config.probe_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(upstream) = self.upstream {
            let live = &mut config.live;
            if let Some(name) = upstream.provider_name {
                live.provider_name = name;
            }
            if let Some(url) = upstream.service_url {
                live.service_url = url;
            }
            if let Some(model) = upstream.model {
                live.model = model;
            }
            if let Some(temperature) = upstream.temperature {
                live.temperature = temperature;
            }
            if let Some(top_p) = upstream.top_p {
                live.top_p = top_p;
            }
            if let Some(top_k) = upstream.top_k {
                live.top_k = top_k;
            }
            if let Some(max_tokens) = upstream.max_output_tokens {
                live.max_output_tokens = max_tokens;
            }
            if let Some(modalities) = upstream.response_modalities {
                live.response_modalities = modalities
                    .iter()
                    .map(|m| ResponseModality::from_str_or_default(m))
                    .collect();
            }
            if let Some(instruction) = upstream.system_instruction {
                live.system_instruction = instruction;
            }
        }

        if let Some(url) = self.tts.and_then(|t| t.url) {
            config.tts_url = url;
        }

        if let Some(token) = self.credentials.and_then(|c| c.access_token) {
            config.google_access_token = Some(token);
        }
    }
}
