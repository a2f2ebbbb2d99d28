//! Error types for the Detectify client library.

use thiserror::Error;

use crate::auth::SigningError;

/// The main error type for all Detectify client operations.
#[derive(Error, Debug)]
pub enum DetectifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(reqwest_middleware::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Detectify API returned a non-success status
    #[error("Detectify API error: {0}")]
    Api(ApiError),

    /// A request could not be signed and was not sent
    #[error("Authentication error: {0}")]
    Auth(#[from] SigningError),

    /// The configured secret is not valid base64
    #[error("Invalid Detectify secret: must be valid base64 ({0})")]
    InvalidSecret(#[source] base64::DecodeError),

    /// The configured API key cannot be carried in an HTTP header
    #[error("Invalid Detectify API key: {0}")]
    InvalidApiKey(String),

    /// No API key configured
    #[error(
        "Missing Detectify API key: set it in the configuration or use the DETECTIFY_API_KEY \
         environment variable, and ensure the value is not empty"
    )]
    MissingApiKey,

    /// Invalid response from the API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DetectifyError {
    /// Whether this error stems from credentials or signing rather than the network.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth(_) | Self::InvalidSecret(_) | Self::InvalidApiKey(_) | Self::MissingApiKey => {
                true
            }
            Self::Api(api) => api.is_unauthorized() || api.is_forbidden(),
            _ => false,
        }
    }
}

impl From<reqwest_middleware::Error> for DetectifyError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            // Signing failures travel through the middleware stack type-erased.
            reqwest_middleware::Error::Middleware(inner) => match inner.downcast::<SigningError>() {
                Ok(signing) => Self::Auth(signing),
                Err(inner) => Self::HttpMiddleware(reqwest_middleware::Error::Middleware(inner)),
            },
            reqwest_middleware::Error::Reqwest(e) => Self::Http(e),
        }
    }
}

/// An error status returned by the Detectify API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Response body, usually a JSON error document
    pub message: String,
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl ApiError {
    /// Create a new API error from status and message.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The server rejected the API key, timestamp or signature.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// The API key lacks permission for the resource.
    pub fn is_forbidden(&self) -> bool {
        self.status == 403
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        self.status == 429
    }
}
