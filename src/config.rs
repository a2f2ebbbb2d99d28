//! Client configuration resolved against the environment.
//!
//! Values come from the `DETECTIFY_API_KEY` and `DETECTIFY_SECRET`
//! environment variables first, then explicitly configured values override
//! them. The API key is mandatory; the secret is optional and enables HMAC
//! signing.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::{API_KEY_ENV, Credentials, SECRET_ENV, StaticCredentials};
use crate::client::DetectifyClient;
use crate::error::DetectifyError;

/// Configuration for a [`DetectifyClient`], typically deserialized from JSON.
///
/// ```rust
/// use detectify_api_client::config::ClientConfig;
///
/// let config: ClientConfig = serde_json::from_str(r#"{"api_key": "key"}"#).unwrap();
/// assert_eq!(config.api_key.as_deref(), Some("key"));
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// API key; falls back to `DETECTIFY_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base64 HMAC secret; falls back to `DETECTIFY_SECRET`
    #[serde(default)]
    pub secret: Option<String>,
    /// Override for the API base URL
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ClientConfig {
    /// Resolve credentials against the process environment.
    pub fn resolve(&self) -> Result<Credentials, DetectifyError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve credentials using `lookup` in place of the process environment.
    ///
    /// Explicit values win over looked-up ones, even when empty.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Credentials, DetectifyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| lookup(API_KEY_ENV))
            .unwrap_or_default();
        let secret = self.secret.clone().or_else(|| lookup(SECRET_ENV));

        Credentials::from_parts(api_key, secret)
    }

    /// Resolve credentials from the environment and build a client.
    pub fn into_client(self) -> Result<DetectifyClient, DetectifyError> {
        let credentials = self.resolve()?;
        self.build_client(credentials)
    }

    pub(crate) fn build_client(
        self,
        credentials: Credentials,
    ) -> Result<DetectifyClient, DetectifyError> {
        let mut builder =
            DetectifyClient::builder().credentials(Arc::new(StaticCredentials::from(credentials)));
        if let Some(base_url) = self.base_url {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ClientConfig")
            .field("api_key", &redact(&self.api_key))
            .field("secret", &redact(&self.secret))
            .field("base_url", &self.base_url)
            .finish()
    }
}
