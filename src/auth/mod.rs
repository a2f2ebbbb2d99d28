//! Authentication module for the Detectify API.
//!
//! This module provides:
//! - Credential management with secure secret storage
//! - Timestamp sources for signed requests
//! - HMAC-SHA256 signature generation over the canonical request string
//! - A `reqwest-middleware` layer that attaches the authentication headers

mod clock;
mod credentials;
mod middleware;
mod signature;

pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{
    API_KEY_ENV, Credentials, CredentialsProvider, EnvCredentials, SECRET_ENV, StaticCredentials,
};
pub use middleware::{KEY_HEADER, SIGNATURE_HEADER, SigningMiddleware, TIMESTAMP_HEADER};
pub use signature::{SigningContext, SigningError, SigningKey, calculate_signature};
