//! # Detectify Client
//!
//! An async Rust client for the Detectify REST API.
//!
//! ## Features
//!
//! - API key authentication on every request
//! - Optional HMAC-SHA256 request signing over `METHOD;PATH;APIKEY;TIMESTAMP;BODY`
//! - Signing as a `reqwest-middleware` layer, re-applied on every retry
//! - Configuration from code, JSON or `DETECTIFY_*` environment variables
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use detectify_api_client::config::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads DETECTIFY_API_KEY and DETECTIFY_SECRET.
//!     let client = ClientConfig::default().into_client()?;
//!     let domains: serde_json::Value = client.get("/v2/domains/").await?;
//!     println!("Domains: {domains}");
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

// Re-export commonly used types at crate root
pub use client::{DetectifyClient, DetectifyClientBuilder};
pub use error::DetectifyError;

/// Result type alias using DetectifyError
pub type Result<T> = std::result::Result<T, DetectifyError>;
