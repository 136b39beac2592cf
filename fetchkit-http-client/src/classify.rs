//! Attempt outcome classification.

use http::StatusCode;
use std::fmt;
use std::sync::Arc;

use crate::{HttpClientError, Result};

/// Statuses that signal a transient server condition.
pub const TRANSIENT_STATUS_CODES: [StatusCode; 4] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Check if a status is worth retrying.
pub fn is_transient_status(status: StatusCode) -> bool {
    TRANSIENT_STATUS_CODES.contains(&status)
}

/// Predicate deciding which response statuses count as success.
///
/// Defaults to accepting `2xx`.
#[derive(Clone)]
pub struct StatusValidator(Arc<dyn Fn(StatusCode) -> bool + Send + Sync>);

impl StatusValidator {
    /// Create a validator from a predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(StatusCode) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    /// Check a status.
    pub fn is_valid(&self, status: StatusCode) -> bool {
        (self.0)(status)
    }
}

impl Default for StatusValidator {
    fn default() -> Self {
        Self::new(|status| status.is_success())
    }
}

impl fmt::Debug for StatusValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusValidator(..)")
    }
}

/// Classification tag of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// The attempt succeeded.
    Success,
    /// The attempt failed but another one may succeed.
    Retryable,
    /// The attempt failed and retrying would not help.
    Fatal,
}

/// A response an attempt executor can hand to the retry loop.
pub trait AttemptResponse: Sized {
    /// Status code of the response.
    fn status(&self) -> StatusCode;

    /// Turn a rejected response into the error reported to the caller.
    fn into_status_error(self) -> HttpClientError {
        HttpClientError::status(self.status())
    }
}

impl AttemptResponse for StatusCode {
    fn status(&self) -> StatusCode {
        *self
    }
}

/// Classified result of one attempt.
#[derive(Debug)]
pub enum AttemptOutcome<R> {
    /// The response passed the status validator.
    Success(R),
    /// Transient failure.
    RetryableFailure(HttpClientError),
    /// Permanent failure.
    FatalFailure(HttpClientError),
}

impl<R: AttemptResponse> AttemptOutcome<R> {
    /// Tag of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::RetryableFailure(_) => OutcomeKind::Retryable,
            Self::FatalFailure(_) => OutcomeKind::Fatal,
        }
    }

    /// Status code, when a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Success(response) => Some(response.status()),
            Self::RetryableFailure(e) | Self::FatalFailure(e) => e.status_code(),
        }
    }
}

/// Classify a response status.
pub fn classify_status(status: StatusCode, validator: &StatusValidator) -> OutcomeKind {
    if validator.is_valid(status) {
        OutcomeKind::Success
    } else if is_transient_status(status) {
        OutcomeKind::Retryable
    } else {
        OutcomeKind::Fatal
    }
}

/// Classify an error returned by an attempt.
pub fn classify_error(error: &HttpClientError) -> OutcomeKind {
    match error {
        HttpClientError::Connection(_) | HttpClientError::Timeout(_) => OutcomeKind::Retryable,
        HttpClientError::Status { status, .. } if is_transient_status(*status) => {
            OutcomeKind::Retryable
        }
        HttpClientError::Http(e) => {
            if let Some(status) = e.status() {
                if is_transient_status(status) {
                    OutcomeKind::Retryable
                } else {
                    OutcomeKind::Fatal
                }
            } else if e.is_connect() || e.is_timeout() || e.is_request() || e.is_body() {
                OutcomeKind::Retryable
            } else {
                OutcomeKind::Fatal
            }
        }
        _ => OutcomeKind::Fatal,
    }
}

/// Classify the result of one attempt.
pub fn classify<R: AttemptResponse>(
    result: Result<R>,
    validator: &StatusValidator,
) -> AttemptOutcome<R> {
    match result {
        Ok(response) => match classify_status(response.status(), validator) {
            OutcomeKind::Success => AttemptOutcome::Success(response),
            OutcomeKind::Retryable => {
                AttemptOutcome::RetryableFailure(response.into_status_error())
            }
            OutcomeKind::Fatal => AttemptOutcome::FatalFailure(response.into_status_error()),
        },
        Err(error) => match classify_error(&error) {
            OutcomeKind::Retryable => AttemptOutcome::RetryableFailure(error),
            _ => AttemptOutcome::FatalFailure(error),
        },
    }
}
