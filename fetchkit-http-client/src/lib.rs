//! # Fetchkit HTTP Client
//!
//! An HTTP client that retries transient failures with backoff, guards each
//! endpoint with its own circuit breaker, and honors caller cancellation and
//! deadlines across the whole call.
//!
//! ## Features
//!
//! - **Retry with Backoff**: fixed, linear or exponential delays with optional full jitter
//! - **Circuit Breakers**: one breaker per `METHOD scheme://host/path` endpoint
//! - **Cancellation**: a `CancellationToken` or deadline interrupts attempts and backoff waits
//! - **Outcome Classification**: 429/502/503/504 and network errors retry, the rest fail fast
//! - **Interceptors**: request/response hooks run on every attempt
//! - **Compression**: Automatic gzip/brotli support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fetchkit_http_client::{HttpClient, HttpClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new(HttpClientConfig::default())?;
//!
//!     let response = client
//!         .get("https://api.example.com/users")
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## With Retry and Circuit Breaker
//!
//! ```rust,no_run
//! use fetchkit_http_client::{
//!     CancellationToken, CircuitBreakerConfig, HttpClient, HttpClientConfig, RetryOptions,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HttpClientConfig::builder()
//!         .base_url("https://api.example.com")
//!         .retry(
//!             RetryOptions::exponential(3, Duration::from_millis(100))
//!                 .with_jitter(true)
//!                 .with_circuit_breaker(true),
//!         )
//!         .circuit_breaker(CircuitBreakerConfig::new(5, Duration::from_secs(30)))
//!         .build();
//!
//!     let client = HttpClient::new(config)?;
//!     let shutdown = CancellationToken::new();
//!
//!     let response = client
//!         .post("/orders")
//!         .json(&serde_json::json!({"item": "widget", "quantity": 5}))
//!         .cancel_on(shutdown.clone())
//!         .total_timeout(Duration::from_secs(10))
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
mod client;
mod config;
pub mod control;
pub mod endpoint;
mod error;
pub mod interceptor;
mod request;
mod response;
pub mod retry;

pub use backoff::BackoffStrategy;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStats,
    CircuitState,
};
pub use classify::{AttemptOutcome, AttemptResponse, OutcomeKind, StatusValidator};
pub use client::HttpClient;
pub use config::{HttpClientConfig, HttpClientConfigBuilder};
pub use control::CallControl;
pub use endpoint::EndpointKey;
pub use error::{ErrorKind, HttpClientError, Result};
pub use interceptor::{
    InterceptorChain, LoggingInterceptor, RequestInterceptor, ResponseInterceptor,
};
pub use request::RequestBuilder;
pub use response::Response;
pub use retry::{RetryOptions, RetryOrchestrator};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use fetchkit_http_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::BackoffStrategy;
    pub use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    pub use crate::classify::StatusValidator;
    pub use crate::client::HttpClient;
    pub use crate::config::{HttpClientConfig, HttpClientConfigBuilder};
    pub use crate::error::{ErrorKind, HttpClientError, Result};
    pub use crate::interceptor::{LoggingInterceptor, RequestInterceptor, ResponseInterceptor};
    pub use crate::request::RequestBuilder;
    pub use crate::response::Response;
    pub use crate::retry::RetryOptions;
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
    pub use tokio_util::sync::CancellationToken;
}
