//! Detectify REST API client implementation.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_tracing::TracingMiddleware;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{Clock, CredentialsProvider, SigningMiddleware, SystemClock};
use crate::error::{ApiError, DetectifyError};

/// Base URL for the Detectify REST API.
pub const DETECTIFY_BASE_URL: &str = "https://api.detectify.com/rest";

/// The Detectify REST API client.
///
/// Every request made through this client passes through a
/// [`SigningMiddleware`], so it carries the API key and, when a secret is
/// configured, a timestamp and HMAC signature. Transient failures are
/// retried, and each retry is signed afresh.
///
/// The client owns its HTTP stack; cloning it is cheap and clones share the
/// connection pool and credentials.
///
/// # Example
///
/// ```rust,no_run
/// use detectify_api_client::DetectifyClient;
/// use detectify_api_client::auth::StaticCredentials;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let credentials = StaticCredentials::new("api_key", Some("c2VjcmV0"))?;
///     let client = DetectifyClient::builder()
///         .credentials(Arc::new(credentials))
///         .build()?;
///
///     let domains: serde_json::Value = client.get("/v2/domains/").await?;
///     println!("Domains: {domains}");
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DetectifyClient {
    http_client: ClientWithMiddleware,
    base_url: String,
    signed: bool,
}

impl DetectifyClient {
    /// Create a new client builder.
    pub fn builder() -> DetectifyClientBuilder {
        DetectifyClientBuilder::new()
    }

    /// The underlying middleware client, for requests the helpers below do not cover.
    ///
    /// Requests sent through it are authenticated like any other.
    pub fn http_client(&self) -> &ClientWithMiddleware {
        &self.http_client
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests are HMAC signed, as opposed to API-key-only.
    pub fn is_signing(&self) -> bool {
        self.signed
    }

    /// Start a request to `endpoint`, relative to the base URL.
    pub fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        self.http_client.request(method, url)
    }

    /// Make a GET request.
    pub async fn get<T>(&self, endpoint: &str) -> Result<T, DetectifyError>
    where
        T: DeserializeOwned,
    {
        let response = self.execute(self.request(Method::GET, endpoint)).await?;
        self.parse_response(response).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T, DetectifyError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.json_request(Method::POST, endpoint, body)?;
        let response = self.execute(builder).await?;
        self.parse_response(response).await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T, DetectifyError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let builder = self.json_request(Method::PUT, endpoint, body)?;
        let response = self.execute(builder).await?;
        self.parse_response(response).await
    }

    /// Make a DELETE request, discarding any response body.
    pub async fn delete(&self, endpoint: &str) -> Result<(), DetectifyError> {
        self.execute(self.request(Method::DELETE, endpoint)).await?;
        Ok(())
    }

    /// Send a request and turn non-success statuses into [`DetectifyError::Api`].
    pub async fn execute(&self, builder: RequestBuilder) -> Result<reqwest::Response, DetectifyError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await?;
        let error = ApiError::new(status.as_u16(), body);
        if error.is_unauthorized() {
            tracing::warn!(status = error.status, "Detectify rejected request credentials");
        }
        Err(DetectifyError::Api(error))
    }

    fn json_request<B>(&self, method: Method, endpoint: &str, body: &B) -> Result<RequestBuilder, DetectifyError>
    where
        B: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(body)?;
        Ok(self
            .request(method, endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload))
    }

    /// Parse a successful response body as JSON.
    async fn parse_response<T>(&self, response: reqwest::Response) -> Result<T, DetectifyError>
    where
        T: DeserializeOwned,
    {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            DetectifyError::InvalidResponse(format!("Failed to parse response: {}. Body: {}", e, body))
        })
    }
}

impl std::fmt::Debug for DetectifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectifyClient")
            .field("base_url", &self.base_url)
            .field("signed", &self.signed)
            .finish()
    }
}

/// Builder for [`DetectifyClient`].
pub struct DetectifyClientBuilder {
    base_url: String,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    clock: Option<Arc<dyn Clock>>,
    user_agent: Option<String>,
    max_retries: u32,
}

impl DetectifyClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: DETECTIFY_BASE_URL.to_string(),
            credentials: None,
            clock: None,
            user_agent: None,
            max_retries: 3,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the credentials provider. Required.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a custom timestamp source for signed requests.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the maximum number of retries for transient failures.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Build the client.
    ///
    /// Fails if no credentials were supplied or the base URL does not parse.
    pub fn build(self) -> Result<DetectifyClient, DetectifyError> {
        let credentials = self.credentials.ok_or(DetectifyError::MissingApiKey)?;
        let base_url = self.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        // Build default headers.
        let mut headers = HeaderMap::new();
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("detectify-api-client/{}", env!("CARGO_PKG_VERSION")));
        let header_value = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("detectify-api-client"));
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder().default_headers(headers).build()?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(self.max_retries);
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let signed = credentials.get_credentials().is_signing();

        // Signing goes last so every retry attempt is signed with a fresh timestamp.
        let client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(SigningMiddleware::with_clock(credentials, clock))
            .build();

        tracing::info!(base_url = %base_url, signed, "Configured Detectify client");

        Ok(DetectifyClient {
            http_client: client,
            base_url,
            signed,
        })
    }
}

impl Default for DetectifyClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
