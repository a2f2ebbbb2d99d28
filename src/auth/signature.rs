//! HMAC-SHA256 signature generation for Detectify API authentication.
//!
//! Signed requests carry a signature computed as:
//! ```text
//! base64(HMAC-SHA256(METHOD;PATH;APIKEY;TIMESTAMP;BODY, base64_decode(secret)))
//! ```
//!
//! `PATH` excludes scheme, host and query string. `TIMESTAMP` is whole
//! seconds since the Unix epoch. `BODY` is the raw request body, empty for
//! requests without one.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use thiserror::Error;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// A request could not be signed. The request is never sent in this case.
#[derive(Error, Debug)]
pub enum SigningError {
    /// The secret is not valid base64
    #[error("secret must be valid base64: {0}")]
    InvalidSecret(#[source] base64::DecodeError),

    /// The request body could not be buffered for signing
    #[error("failed to read request body for signing: {0}")]
    Body(#[source] reqwest::Error),

    /// A computed value is not a valid header value
    #[error("invalid value for header {0}")]
    InvalidHeader(&'static str),
}

const DELIMITER: u8 = b';';

/// The request fields covered by a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningContext<'a> {
    /// HTTP method, e.g. `GET`
    pub method: &'a str,
    /// URL path without query string
    pub path: &'a str,
    /// API key sent in `X-Detectify-Key`
    pub api_key: &'a str,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Raw request body bytes
    pub body: &'a [u8],
}

impl<'a> SigningContext<'a> {
    /// Create a signing context, truncating `timestamp` to whole seconds.
    pub fn new(
        method: &'a str,
        path: &'a str,
        api_key: &'a str,
        timestamp: OffsetDateTime,
        body: &'a [u8],
    ) -> Self {
        Self {
            method,
            path,
            api_key,
            timestamp: timestamp.unix_timestamp(),
            body,
        }
    }

    /// The canonical string both client and server sign: `METHOD;PATH;APIKEY;TIMESTAMP;BODY`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let timestamp = self.timestamp.to_string();
        let mut value = Vec::with_capacity(
            self.method.len()
                + self.path.len()
                + self.api_key.len()
                + timestamp.len()
                + self.body.len()
                + 4,
        );
        for field in [
            self.method.as_bytes(),
            self.path.as_bytes(),
            self.api_key.as_bytes(),
            timestamp.as_bytes(),
        ] {
            value.extend_from_slice(field);
            value.push(DELIMITER);
        }
        value.extend_from_slice(self.body);
        value
    }
}

/// A decoded HMAC secret.
///
/// Decoding happens once, when credentials are configured, so signing a
/// request can no longer fail on bad key material.
pub struct SigningKey {
    key: SecretSlice<u8>,
}

impl SigningKey {
    /// Decode a base64 (standard alphabet, padded) secret.
    pub fn from_base64(secret: &str) -> Result<Self, base64::DecodeError> {
        let decoded = BASE64.decode(secret)?;
        Ok(Self {
            key: SecretSlice::new(decoded.into_boxed_slice()),
        })
    }

    /// Compute the base64-encoded signature for `context`.
    pub fn sign(&self, context: &SigningContext<'_>) -> String {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
        mac.update(&context.canonical_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Calculate the signature for a request from a base64-encoded secret.
///
/// # Arguments
///
/// * `context` - The request fields to sign
/// * `secret_key` - The API secret, base64 encoded
///
/// # Returns
///
/// Base64-encoded HMAC-SHA256 signature for the `X-Detectify-Signature` header.
///
/// # Example
///
/// ```rust
/// use detectify_api_client::auth::{SigningContext, calculate_signature};
/// use time::OffsetDateTime;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let timestamp = OffsetDateTime::from_unix_timestamp(1519829567)?;
/// let context = SigningContext::new("GET", "/v2/domains/", "api_key", timestamp, b"");
/// let signature = calculate_signature(&context, "c2VjcmV0")?;
/// assert_eq!(signature.len(), 44);
/// # Ok(())
/// # }
/// ```
pub fn calculate_signature(
    context: &SigningContext<'_>,
    secret_key: &str,
) -> Result<String, SigningError> {
    let key = SigningKey::from_base64(secret_key).map_err(SigningError::InvalidSecret)?;
    Ok(key.sign(context))
}
