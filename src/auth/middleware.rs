//! Request signing as a `reqwest-middleware` layer.
//!
//! [`SigningMiddleware`] sits at the bottom of the middleware stack, directly
//! above the network. Every attempt (including retries issued by layers
//! above it) gets a fresh timestamp and signature.

use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue};
use http_body_util::BodyExt;
use reqwest::{Body, Request, Response};
use reqwest_middleware::{Middleware, Next};

use crate::auth::{Clock, CredentialsProvider, SigningContext, SigningError, SystemClock};

/// Header carrying the API key. Always present.
pub const KEY_HEADER: HeaderName = HeaderName::from_static("x-detectify-key");
/// Header carrying the signed Unix timestamp.
pub const TIMESTAMP_HEADER: HeaderName = HeaderName::from_static("x-detectify-timestamp");
/// Header carrying the base64 HMAC-SHA256 signature.
pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-detectify-signature");

/// Middleware that authenticates every outgoing request.
///
/// The API key header is always attached. When the credentials carry a
/// secret, the request body is buffered, signed together with the method,
/// path and current timestamp, and the timestamp and signature headers are
/// attached as well. The buffered body is what gets sent.
///
/// If signing fails the request is not sent and the error is returned as
/// [`reqwest_middleware::Error::Middleware`] wrapping a [`SigningError`].
#[derive(Clone)]
pub struct SigningMiddleware {
    credentials: Arc<dyn CredentialsProvider>,
    clock: Arc<dyn Clock>,
}

impl SigningMiddleware {
    /// Create a middleware using the system clock.
    pub fn new(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self::with_clock(credentials, Arc::new(SystemClock))
    }

    /// Create a middleware with a custom timestamp source.
    pub fn with_clock(credentials: Arc<dyn CredentialsProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { credentials, clock }
    }

    /// Build the authentication headers for one request.
    ///
    /// May replace the request body with an equivalent buffered body.
    async fn auth_headers(&self, req: &mut Request) -> Result<HeaderMap, SigningError> {
        let credentials = self.credentials.get_credentials();

        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(KEY_HEADER, credentials.key_header().clone());

        let Some(signing_key) = credentials.signing_key() else {
            return Ok(headers);
        };

        let body = buffer_body(req).await?;
        let context = SigningContext::new(
            req.method().as_str(),
            req.url().path(),
            credentials.expose_api_key(),
            self.clock.now(),
            &body,
        );
        let signature = signing_key.sign(&context);

        tracing::debug!(
            method = context.method,
            path = context.path,
            timestamp = context.timestamp,
            "Signed Detectify request"
        );

        let signature = HeaderValue::from_str(&signature)
            .map_err(|_| SigningError::InvalidHeader("x-detectify-signature"))?;
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from(context.timestamp));
        headers.insert(SIGNATURE_HEADER, signature);

        Ok(headers)
    }
}

impl std::fmt::Debug for SigningMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningMiddleware")
            .field("credentials", self.credentials.get_credentials())
            .finish()
    }
}

#[async_trait::async_trait]
impl Middleware for SigningMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        // Build every header before touching the request so a failure never
        // leaves it half-signed.
        let headers = self.auth_headers(&mut req).await.map_err(|e| {
            tracing::warn!(error = %e, "Refusing to send unsigned Detectify request");
            reqwest_middleware::Error::middleware(e)
        })?;

        let target = req.headers_mut();
        for (name, value) in headers.iter() {
            target.insert(name.clone(), value.clone());
        }

        next.run(req, extensions).await
    }
}

/// Read the full request body and put an identical buffered body back.
async fn buffer_body(req: &mut Request) -> Result<Bytes, SigningError> {
    let Some(body) = req.body_mut().take() else {
        return Ok(Bytes::new());
    };

    let in_memory = body.as_bytes().map(Bytes::copy_from_slice);
    let bytes = match in_memory {
        Some(bytes) => bytes,
        None => body.collect().await.map_err(SigningError::Body)?.to_bytes(),
    };

    *req.body_mut() = Some(Body::from(bytes.clone()));
    Ok(bytes)
}
