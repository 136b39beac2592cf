//! Retry options and the retry loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backoff::BackoffStrategy;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry};
use crate::classify::{self, AttemptOutcome, AttemptResponse, StatusValidator};
use crate::control::CallControl;
use crate::endpoint::EndpointKey;
use crate::{HttpClientError, Result};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Delay unit the strategy scales.
    pub base_delay: Duration,
    /// Draw each delay uniformly from `[0, delay]`.
    pub jitter: bool,
    /// Consult and update the per-endpoint circuit breaker.
    pub circuit_breaker_enabled: bool,
    /// Upper bound on a single delay, applied before jitter.
    pub max_delay: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Exponential,
            base_delay: Duration::from_millis(100),
            jitter: false,
            circuit_breaker_enabled: false,
            max_delay: None,
        }
    }
}

impl RetryOptions {
    /// Create retry options with exponential backoff.
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Exponential,
            base_delay,
            ..Default::default()
        }
    }

    /// Create retry options with linear backoff.
    pub fn linear(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Linear,
            base_delay,
            ..Default::default()
        }
    }

    /// Create retry options with a fixed delay.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: BackoffStrategy::Fixed,
            base_delay: delay,
            ..Default::default()
        }
    }

    /// A single attempt, no circuit breaker.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Enable or disable full jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Enable or disable the circuit breaker.
    pub fn with_circuit_breaker(mut self, enabled: bool) -> Self {
        self.circuit_breaker_enabled = enabled;
        self
    }

    /// Cap every delay at `max`.
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.backoff.base_delay_for(attempt, self.base_delay);
        let delay = match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        };

        if self.jitter {
            crate::backoff::full_jitter(delay)
        } else {
            delay
        }
    }
}

/// Drives the attempt loop for one logical call.
///
/// Holds the breaker registry shared by every call of a client.
#[derive(Debug, Clone, Default)]
pub struct RetryOrchestrator {
    breakers: Arc<CircuitBreakerRegistry>,
}

impl RetryOrchestrator {
    /// Create an orchestrator over a breaker registry.
    pub fn new(breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self { breakers }
    }

    /// The breaker registry.
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Run `attempt` until it succeeds, fails fatally, the retry budget runs
    /// out, the breaker rejects the endpoint, or the call is interrupted.
    ///
    /// `attempt` performs one round trip. Each attempt and each backoff wait is
    /// raced against `control`.
    pub async fn execute<F, Fut, R>(
        &self,
        options: &RetryOptions,
        endpoint: &EndpointKey,
        control: &CallControl,
        validator: &StatusValidator,
        mut attempt: F,
    ) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
        R: AttemptResponse,
    {
        control.check()?;

        let breaker = options
            .circuit_breaker_enabled
            .then(|| self.breakers.breaker(endpoint));
        let mut attempts: u32 = 1;

        loop {
            if let Some(cb) = &breaker
                && !cb.allow()
            {
                warn!(
                    endpoint = %endpoint,
                    attempt = attempts,
                    "Circuit breaker open, rejecting request"
                );
                return Err(HttpClientError::CircuitOpen {
                    endpoint: endpoint.clone(),
                });
            }

            let result = tokio::select! {
                biased;
                err = control.interrupted() => {
                    release_probe(breaker.as_deref());
                    return Err(err);
                }
                result = attempt() => result,
            };

            match classify::classify(result, validator) {
                AttemptOutcome::Success(response) => {
                    if let Some(cb) = &breaker {
                        cb.record_success();
                    }
                    if attempts > 1 {
                        debug!(endpoint = %endpoint, attempts, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                AttemptOutcome::FatalFailure(error) => {
                    if error.is_cancelled() {
                        release_probe(breaker.as_deref());
                    } else if let Some(cb) = &breaker {
                        cb.record_failure();
                    }
                    debug!(
                        endpoint = %endpoint,
                        attempt = attempts,
                        error = %error,
                        "Request failed, not retrying"
                    );
                    return Err(error);
                }
                AttemptOutcome::RetryableFailure(error) => {
                    if let Some(cb) = &breaker {
                        cb.record_failure();
                    }

                    if attempts > options.max_retries {
                        if attempts == 1 {
                            return Err(error);
                        }
                        debug!(endpoint = %endpoint, attempts, error = %error, "Retries exhausted");
                        return Err(HttpClientError::RetriesExhausted {
                            attempts,
                            last: Box::new(error),
                        });
                    }

                    let delay = options.delay_for_attempt(attempts);
                    debug!(
                        endpoint = %endpoint,
                        attempt = attempts,
                        delay = ?delay,
                        error = %error,
                        "Retrying request"
                    );
                    control.sleep(delay).await?;
                    attempts += 1;
                }
            }
        }
    }
}

fn release_probe(breaker: Option<&CircuitBreaker>) {
    if let Some(cb) = breaker {
        cb.release_probe();
    }
}
