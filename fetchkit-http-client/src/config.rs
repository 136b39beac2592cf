//! HTTP client configuration.

use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::classify::StatusValidator;
use crate::retry::RetryOptions;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL that relative request paths are joined onto.
    pub base_url: Option<String>,
    /// Timeout of a single attempt.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Deadline for a whole call, all attempts and backoff waits included.
    pub total_timeout: Option<Duration>,
    /// Retry options; `None` sends every request once.
    pub retry: Option<RetryOptions>,
    /// Tuning for the per-endpoint circuit breakers.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Decides which statuses count as success.
    pub status_validator: StatusValidator,
    /// Default headers for all requests.
    pub default_headers: Vec<(String, String)>,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            total_timeout: None,
            retry: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            status_validator: StatusValidator::default(),
            default_headers: Vec::new(),
            user_agent: format!("fetchkit-http-client/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Retry options in effect, a single attempt when none are set.
    pub fn retry_options(&self) -> RetryOptions {
        self.retry.clone().unwrap_or_else(RetryOptions::none)
    }
}

/// Builder for HTTP client configuration.
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL for all requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the timeout of a single attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Bound every call, retries included.
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.config.total_timeout = Some(timeout);
        self
    }

    /// Set retry options.
    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.config.retry = Some(options);
        self
    }

    /// Set circuit breaker tuning.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.config.circuit_breaker = config;
        self
    }

    /// Set the status validator.
    pub fn status_validator(mut self, validator: StatusValidator) -> Self {
        self.config.status_validator = validator;
        self
    }

    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_defaults_send_once() {
        let config = HttpClientConfig::default();

        assert_eq!(config.retry_options(), RetryOptions::none());
        assert!(!config.retry_options().circuit_breaker_enabled);
        assert!(config.status_validator.is_valid(StatusCode::OK));
        assert!(!config.status_validator.is_valid(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_builder() {
        let config = HttpClientConfig::builder()
            .base_url("https://api.example.com")
            .total_timeout(Duration::from_secs(5))
            .retry(RetryOptions::exponential(2, Duration::from_millis(50)).with_jitter(true))
            .circuit_breaker(CircuitBreakerConfig::new(3, Duration::from_secs(1)))
            .default_header("X-Api-Key", "secret")
            .build();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.total_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.retry_options().max_retries, 2);
        assert!(config.retry_options().jitter);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.default_headers.len(), 1);
    }
}
