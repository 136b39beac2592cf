//! HTTP client error types.

use http::{HeaderMap, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::classify::{self, OutcomeKind};
use crate::endpoint::EndpointKey;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Retries were exhausted; `last` is the final retryable error, unchanged.
    #[error("Request failed after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error returned by the last attempt.
        #[source]
        last: Box<HttpClientError>,
    },

    /// Circuit breaker for the endpoint is open, no attempt was made.
    #[error("Circuit breaker is open for {endpoint}, request rejected")]
    CircuitOpen {
        /// Endpoint whose breaker rejected the call.
        endpoint: EndpointKey,
    },

    /// The caller cancelled the call.
    #[error("Request cancelled by caller")]
    Cancelled,

    /// The caller's deadline for the whole call passed.
    #[error("Call deadline exceeded")]
    DeadlineExceeded,

    /// A single attempt timed out; carries the attempt timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The response status was rejected by the status validator.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Error message (response body, or the canonical reason).
        message: String,
        /// Response headers.
        headers: HeaderMap,
    },

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Interceptor error.
    #[error("Interceptor error: {0}")]
    Interceptor(String),

    /// Underlying HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse error taxonomy callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transport failure, retryable.
    Network,
    /// 429, 502, 503 or 504, retryable.
    ServerTransient,
    /// Any other failure, including caller cancellation. Never retried.
    ClientOrFatal,
    /// Rejected by an open circuit breaker without an attempt.
    CircuitOpen,
    /// The retry budget ran out; see [`HttpClientError::last_error`].
    RetriesExhausted,
}

impl HttpClientError {
    /// Build a status error with the canonical reason phrase as message.
    pub fn status(status: StatusCode) -> Self {
        Self::Status {
            status,
            message: status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            _ if self.status_code().is_some_and(classify::is_transient_status) => {
                ErrorKind::ServerTransient
            }
            _ if self.is_retryable() => ErrorKind::Network,
            _ => ErrorKind::ClientOrFatal,
        }
    }

    /// Check if a fresh attempt could succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        classify::classify_error(self) == OutcomeKind::Retryable
    }

    /// Check if this is a timeout of a single attempt.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if the breaker rejected the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Check if the caller cancelled the call or its deadline passed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// The error of the final attempt, looking through `RetriesExhausted`.
    pub fn last_error(&self) -> &HttpClientError {
        match self {
            Self::RetriesExhausted { last, .. } => last.last_error(),
            other => other,
        }
    }

    /// Get the HTTP status code if a response was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self.last_error() {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }
}
