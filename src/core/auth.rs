//! Bearer token acquisition for Google Cloud endpoints.
//!
//! Both the streaming backend and the speech synthesis endpoint authenticate
//! with an OAuth2 bearer token. Tokens are requested on demand: once per
//! session establishment and once per synthesis call.

use std::sync::Arc;

use async_trait::async_trait;
use google_cloud_auth::credentials::{Builder, CacheableResource, Credentials};
use http::{Extensions, header::AUTHORIZATION};
use zeroize::Zeroizing;

use crate::errors::{ProxyError, ProxyResult};

/// OAuth2 scope covering Vertex AI and Cloud Text-to-Speech.
pub const GOOGLE_CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Supplies bearer tokens on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Obtain a bearer token (without the `Bearer ` prefix).
    async fn access_token(&self) -> ProxyResult<String>;
}

/// Shared token provider handle.
pub type SharedTokenProvider = Arc<dyn TokenProvider>;

/// Token provider returning a fixed, pre-issued token.
pub struct StaticTokenProvider {
    token: Zeroizing<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Zeroizing::new(token.into()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> ProxyResult<String> {
        if self.token.is_empty() {
            return Err(ProxyError::Credential(
                "configured access token is empty".to_string(),
            ));
        }
        Ok(self.token.as_str().to_owned())
    }
}

/// Token provider backed by Google Application Default Credentials.
///
/// Resolution follows the usual ADC order: `GOOGLE_APPLICATION_CREDENTIALS`,
/// the gcloud user credentials file, then the metadata server.
pub struct GoogleTokenProvider {
    credentials: Credentials,
}

impl GoogleTokenProvider {
    /// Build ADC credentials restricted to the given scopes.
    pub fn new(scopes: &[&str]) -> ProxyResult<Self> {
        let credentials = Builder::default()
            .with_scopes(scopes.iter().copied())
            .build()
            .map_err(|e| ProxyError::Credential(format!("error getting credentials: {e}")))?;
        Ok(Self { credentials })
    }
}

#[async_trait]
impl TokenProvider for GoogleTokenProvider {
    async fn access_token(&self) -> ProxyResult<String> {
        let headers = match self
            .credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| ProxyError::Credential(format!("error retrieving access token: {e}")))?
        {
            CacheableResource::New { data, .. } => data,
            CacheableResource::NotModified => {
                return Err(ProxyError::Credential(
                    "credential source returned no headers".to_string(),
                ));
            }
        };

        let value = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ProxyError::Credential("credentials produced no authorization header".to_string())
            })?;

        bearer_token(value)
    }
}

/// Strip the `Bearer ` scheme from an authorization header value.
fn bearer_token(header_value: &str) -> ProxyResult<String> {
    header_value
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ProxyError::Credential("authorization header is not a bearer token".to_string())
        })
}

/// Pick the provider for the configured credentials: a static token when one is
/// configured, Application Default Credentials otherwise.
pub fn token_provider_for(static_token: Option<&str>) -> ProxyResult<SharedTokenProvider> {
    match static_token {
        Some(token) => Ok(Arc::new(StaticTokenProvider::new(token))),
        None => Ok(Arc::new(GoogleTokenProvider::new(&[
            GOOGLE_CLOUD_PLATFORM_SCOPE,
        ])?)),
    }
}
