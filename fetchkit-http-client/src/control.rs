//! Caller cancellation and per-call deadlines.

use std::future::pending;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{HttpClientError, Result};

/// Cancellation signal and deadline bounding one logical call.
///
/// The deadline covers every attempt and every backoff wait of the call.
#[derive(Debug, Clone, Default)]
pub struct CallControl {
    cancel: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl CallControl {
    /// A call with neither cancellation nor deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the call when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Abort the call at `deadline`. An earlier deadline already set wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Abort the call once `timeout` has elapsed from now.
    ///
    /// A timeout too large to represent as an instant sets no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The cancellation token, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Fail fast if the call is already cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(HttpClientError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(HttpClientError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolve with the matching error once the call is cancelled or its
    /// deadline passes. Never resolves when neither is configured.
    pub async fn interrupted(&self) -> HttpClientError {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => HttpClientError::Cancelled,
            _ = expired => HttpClientError::DeadlineExceeded,
        }
    }

    /// Sleep for `delay` unless the call is interrupted first.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.check();
        }

        tokio::select! {
            biased;
            err = self.interrupted() => Err(err),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
