//! Environment variable loading.

use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{ServerConfig, TlsConfig};
use crate::core::live::ResponseModality;

/// Read a variable, treating empty values as unset.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable. Unparseable values are an error, not a silent default.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, Box<dyn Error>> {
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid value for {key}: '{raw}'").into()),
        None => Ok(None),
    }
}

fn env_seconds(key: &str) -> Result<Option<Duration>, Box<dyn Error>> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_secs))
}

/// Build a config from defaults overridden by environment variables.
pub(super) fn load() -> Result<ServerConfig, Box<dyn Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }
    if let Some(level) = env_string("LOG_LEVEL") {
        config.log_level = level;
    }

    config.tls = match (env_string("TLS_CERT_PATH"), env_string("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };

    if let Some(origins) = env_string("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }
    if let Some(rps) = env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }

    if let Some(max) = env_parse("MAX_CONNECTIONS")? {
        config.max_connections = max;
    }
    if let Some(interval) = env_seconds("CLEANUP_INTERVAL_SECONDS")? {
        config.cleanup_interval = interval;
    }
    if let Some(timeout) = env_seconds("PROBE_TIMEOUT_SECONDS")? {
        config.probe_timeout = timeout;
    }

    let live = &mut config.live;
    if let Some(name) = env_string("PROVIDER_NAME") {
        live.provider_name = name;
    }
    if let Some(url) = env_string("SERVICE_URL") {
        live.service_url = url;
    }
    if let Some(model) = env_string("MODEL_NAME") {
        live.model = model;
    }
    if let Some(temperature) = env_parse("TEMPERATURE")? {
        live.temperature = temperature;
    }
    if let Some(top_p) = env_parse("TOP_P")? {
        live.top_p = top_p;
    }
    if let Some(top_k) = env_parse("TOP_K")? {
        live.top_k = top_k;
    }
    if let Some(max_tokens) = env_parse("MAX_TOKENS")? {
        live.max_output_tokens = max_tokens;
    }
    if let Some(modalities) = env_string("RESPONSE_MODALITIES") {
        live.response_modalities = modalities
            .split(',')
            .filter(|m| !m.trim().is_empty())
            .map(ResponseModality::from_str_or_default)
            .collect();
    }
    if let Some(instruction) = env_string("SYSTEM_INSTRUCTION") {
        live.system_instruction = instruction;
    }

    if let Some(url) = env_string("TTS_URL") {
        config.tts_url = url;
    }
    config.google_access_token = env_string("GOOGLE_ACCESS_TOKEN");

    Ok(config)
}
