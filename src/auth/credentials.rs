//! Credential management for Detectify API authentication.

use std::sync::Arc;

use http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::auth::SigningKey;
use crate::error::DetectifyError;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "DETECTIFY_API_KEY";
/// Environment variable holding the optional HMAC secret.
pub const SECRET_ENV: &str = "DETECTIFY_SECRET";

/// API credentials: the key and an optional signing secret.
///
/// Both values are validated on construction, so a `Credentials` value can
/// always produce its headers. Without a secret, requests carry only the
/// API key header.
pub struct Credentials {
    api_key: SecretString,
    key_header: HeaderValue,
    signing_key: Option<SigningKey>,
}

impl Credentials {
    /// Create API-key-only credentials. Requests will not be signed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, DetectifyError> {
        Self::from_parts(api_key.into(), None)
    }

    /// Create credentials that sign every request with `secret`.
    ///
    /// `secret` must be base64 encoded. An empty secret disables signing.
    pub fn with_secret(
        api_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self, DetectifyError> {
        Self::from_parts(api_key.into(), Some(secret.into()))
    }

    pub(crate) fn from_parts(api_key: String, secret: Option<String>) -> Result<Self, DetectifyError> {
        if api_key.is_empty() {
            return Err(DetectifyError::MissingApiKey);
        }

        let mut key_header = HeaderValue::from_str(&api_key).map_err(|_| {
            DetectifyError::InvalidApiKey("contains characters not allowed in a header".to_string())
        })?;
        key_header.set_sensitive(true);

        let signing_key = match secret.as_deref() {
            None | Some("") => None,
            Some(secret) => {
                Some(SigningKey::from_base64(secret).map_err(DetectifyError::InvalidSecret)?)
            }
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            key_header,
            signing_key,
        })
    }

    /// Get the API key.
    ///
    /// This method exposes the key - use carefully.
    pub fn expose_api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// The API key as a sensitive header value.
    pub(crate) fn key_header(&self) -> &HeaderValue {
        &self.key_header
    }

    /// The decoded secret, if requests should be signed.
    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_ref()
    }

    /// Whether requests made with these credentials are signed.
    pub fn is_signing(&self) -> bool {
        self.signing_key.is_some()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .field("signing", &self.is_signing())
            .finish()
    }
}

/// Trait for providing API credentials.
///
/// Implement this trait to customize how credentials are retrieved,
/// for example from a secrets manager.
pub trait CredentialsProvider: Send + Sync {
    /// Get the credentials.
    fn get_credentials(&self) -> &Credentials;
}

/// Static credentials provider that holds credentials directly.
#[derive(Debug)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Create a new static credentials provider.
    ///
    /// Pass `None` for API-key-only authentication.
    pub fn new(api_key: impl Into<String>, secret: Option<&str>) -> Result<Self, DetectifyError> {
        Ok(Self {
            credentials: Credentials::from_parts(api_key.into(), secret.map(str::to_string))?,
        })
    }
}

impl From<Credentials> for StaticCredentials {
    fn from(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl CredentialsProvider for StaticCredentials {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl CredentialsProvider for Arc<StaticCredentials> {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// Credentials provider that reads from environment variables.
///
/// By default, reads from `DETECTIFY_API_KEY` and `DETECTIFY_SECRET`.
/// The secret is optional.
#[derive(Debug)]
pub struct EnvCredentials {
    credentials: Credentials,
}

impl EnvCredentials {
    /// Create credentials from default environment variables.
    ///
    /// Fails with [`DetectifyError::MissingApiKey`] if `DETECTIFY_API_KEY` is
    /// unset or empty.
    pub fn from_env() -> Result<Self, DetectifyError> {
        Self::from_env_vars(API_KEY_ENV, SECRET_ENV)
    }

    /// Create credentials from custom environment variable names.
    pub fn from_env_vars(key_var: &str, secret_var: &str) -> Result<Self, DetectifyError> {
        Self::try_from_env_vars(key_var, secret_var)?.ok_or(DetectifyError::MissingApiKey)
    }

    /// Try to create credentials from default environment variables.
    ///
    /// Returns `Ok(None)` if the API key variable is not set. A set but
    /// malformed secret is still an error.
    pub fn try_from_env() -> Result<Option<Self>, DetectifyError> {
        Self::try_from_env_vars(API_KEY_ENV, SECRET_ENV)
    }

    /// Try to create credentials from custom environment variable names.
    pub fn try_from_env_vars(
        key_var: &str,
        secret_var: &str,
    ) -> Result<Option<Self>, DetectifyError> {
        let Ok(api_key) = std::env::var(key_var) else {
            return Ok(None);
        };
        let secret = std::env::var(secret_var).ok();

        Ok(Some(Self {
            credentials: Credentials::from_parts(api_key, secret)?,
        }))
    }
}

impl CredentialsProvider for EnvCredentials {
    fn get_credentials(&self) -> &Credentials {
        &self.credentials
    }
}
