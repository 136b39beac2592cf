//! Per-endpoint circuit breakers.
//!
//! ## States
//!
//! - **Closed**: attempts pass through, consecutive failures are counted
//! - **Open**: attempts are rejected without touching the network
//! - **Half-Open**: one probe attempt is let through to test recovery
//!
//! The Open → Half-Open edge is evaluated lazily in [`CircuitBreaker::allow`];
//! no timer runs in the background.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::endpoint::EndpointKey;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed.
    Closed,
    /// Circuit is open, requests are rejected.
    Open,
    /// Circuit is half-open, a single probe is allowed.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures that opens the circuit.
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new circuit breaker config.
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            open_timeout,
        }
    }

    /// Set the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the open timeout.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    fn threshold(&self) -> u32 {
        self.failure_threshold.max(1)
    }
}

/// Point-in-time view of one breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Endpoint the breaker guards.
    pub endpoint: EndpointKey,
    /// Current state.
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Time of the most recent failure.
    pub last_failure: Option<Instant>,
    /// Total successes recorded.
    pub total_successes: u64,
    /// Total failures recorded.
    pub total_failures: u64,
    /// Total attempts rejected.
    pub total_rejections: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    probe_started: Option<Instant>,
    total_successes: u64,
    total_failures: u64,
    total_rejections: u64,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
            probe_started: None,
            total_successes: 0,
            total_failures: 0,
            total_rejections: 0,
        }
    }
}

/// Circuit breaker for a single endpoint.
///
/// Every operation runs under one lock, so concurrent callers observe a
/// linearizable sequence of transitions.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: EndpointKey,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new, closed circuit breaker.
    pub fn new(endpoint: EndpointKey, config: CircuitBreakerConfig) -> Self {
        Self {
            endpoint,
            config,
            inner: Mutex::new(BreakerState::closed()),
        }
    }

    /// Endpoint guarded by this breaker.
    pub fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    /// Get the current state.
    ///
    /// An elapsed open timeout only shows up here after the next
    /// [`allow`](Self::allow) call.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Check if an attempt may proceed.
    ///
    /// In the Open state, the first call after `open_timeout` has elapsed since
    /// the last failure moves the breaker to Half-Open and is admitted as the
    /// probe. Further callers are rejected until the probe reports back, or
    /// until the probe itself has been outstanding for `open_timeout`.
    pub fn allow(&self) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let allowed = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .is_none_or(|at| now.duration_since(at) >= self.config.open_timeout);
                if cooled_down {
                    debug!(endpoint = %self.endpoint, "Circuit breaker transitioning to half-open");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_started = Some(now);
                }
                cooled_down
            }
            CircuitState::HalfOpen => {
                let probe_free = inner
                    .probe_started
                    .is_none_or(|at| now.duration_since(at) >= self.config.open_timeout);
                if probe_free {
                    debug!(endpoint = %self.endpoint, "Admitting half-open probe");
                    inner.probe_started = Some(now);
                }
                probe_free
            }
        };

        if !allowed {
            inner.total_rejections += 1;
        }
        allowed
    }

    /// Record a successful attempt.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_successes += 1;
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            info!(endpoint = %self.endpoint, "Circuit breaker closing");
            inner.state = CircuitState::Closed;
            inner.probe_started = None;
        }
    }

    /// Record a failed attempt.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_failures += 1;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.config.threshold() => {
                info!(
                    endpoint = %self.endpoint,
                    failures = inner.consecutive_failures,
                    "Circuit breaker opening"
                );
                inner.state = CircuitState::Open;
            }
            CircuitState::HalfOpen => {
                info!(
                    endpoint = %self.endpoint,
                    "Half-open probe failed, circuit breaker reopening"
                );
                inner.state = CircuitState::Open;
                inner.probe_started = None;
            }
            _ => {}
        }
    }

    /// Free the probe slot when a probe ended without a verdict.
    pub fn release_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_started = None;
        }
    }

    /// Reset the circuit breaker to closed state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(endpoint = %self.endpoint, "Circuit breaker reset");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure = None;
        inner.probe_started = None;
    }

    /// Get the current consecutive failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Get circuit breaker statistics.
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            endpoint: self.endpoint.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure: inner.last_failure,
            total_successes: inner.total_successes,
            total_failures: inner.total_failures,
            total_rejections: inner.total_rejections,
        }
    }
}

/// Registry of circuit breakers keyed by endpoint.
///
/// Owned by a client and shared by every request it sends. Breakers are
/// created on first use and live until removed or the registry is dropped.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<EndpointKey, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry whose breakers use `config`.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Tuning applied to new breakers.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the breaker for an endpoint, creating it on first use.
    pub fn breaker(&self, endpoint: &EndpointKey) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return Arc::clone(existing.value());
        }

        self.breakers
            .entry(endpoint.clone())
            .or_insert_with(|| {
                debug!(endpoint = %endpoint, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(endpoint.clone(), self.config.clone()))
            })
            .value()
            .clone()
    }

    /// Check if an attempt against `endpoint` may proceed.
    pub fn allow(&self, endpoint: &EndpointKey) -> bool {
        self.breaker(endpoint).allow()
    }

    /// Record a successful attempt against `endpoint`.
    pub fn record_success(&self, endpoint: &EndpointKey) {
        self.breaker(endpoint).record_success();
    }

    /// Record a failed attempt against `endpoint`.
    pub fn record_failure(&self, endpoint: &EndpointKey) {
        self.breaker(endpoint).record_failure();
    }

    /// State of an endpoint's breaker, if one exists.
    pub fn state(&self, endpoint: &EndpointKey) -> Option<CircuitState> {
        self.breakers.get(endpoint).map(|b| b.state())
    }

    /// Statistics of an endpoint's breaker, if one exists.
    pub fn stats(&self, endpoint: &EndpointKey) -> Option<CircuitBreakerStats> {
        self.breakers.get(endpoint).map(|b| b.stats())
    }

    /// Statistics of every breaker.
    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers.iter().map(|entry| entry.value().stats()).collect()
    }

    /// Reset an endpoint's breaker to closed.
    pub fn reset(&self, endpoint: &EndpointKey) {
        if let Some(breaker) = self.breakers.get(endpoint) {
            breaker.reset();
        }
    }

    /// Drop an endpoint's breaker.
    pub fn remove(&self, endpoint: &EndpointKey) -> Option<Arc<CircuitBreaker>> {
        self.breakers.remove(endpoint).map(|(_, breaker)| breaker)
    }

    /// Drop every breaker.
    pub fn clear(&self) {
        self.breakers.clear();
    }

    /// Number of tracked endpoints.
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Check if no endpoint is tracked.
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
