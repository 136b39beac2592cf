//! HTTP client implementation.

use http::Method;
use reqwest::Request;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::classify::StatusValidator;
use crate::control::CallControl;
use crate::endpoint::EndpointKey;
use crate::interceptor::{InterceptorChain, RequestInterceptor, ResponseInterceptor};
use crate::retry::{RetryOptions, RetryOrchestrator};
use crate::{HttpClientConfig, HttpClientError, RequestBuilder, Response, Result};

/// HTTP client with retry, per-endpoint circuit breakers, and cancellation.
///
/// Cloning is cheap. Clones share the connection pool, the interceptors and
/// the circuit breaker registry.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: Arc<HttpClientConfig>,
    orchestrator: RetryOrchestrator,
    interceptors: Arc<InterceptorChain>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .brotli(config.brotli);

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        let inner = builder.build()?;
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));

        Ok(Self {
            inner,
            config: Arc::new(config),
            orchestrator: RetryOrchestrator::new(breakers),
            interceptors: Arc::new(InterceptorChain::new()),
        })
    }

    /// Create a new HTTP client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Circuit breakers of the endpoints this client has called.
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        self.orchestrator.breakers()
    }

    /// Get the interceptors.
    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// A client using `options` for every call.
    ///
    /// The derived client keeps the connection pool, interceptors and breaker
    /// registry of this one.
    pub fn with_retry_options(&self, options: RetryOptions) -> Self {
        let mut config = (*self.config).clone();
        config.retry = Some(options);

        Self {
            config: Arc::new(config),
            ..self.clone()
        }
    }

    /// An independent client with the same configuration and interceptors.
    ///
    /// The new client starts with an empty breaker registry.
    pub fn new_instance(&self) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            self.config.circuit_breaker.clone(),
        ));

        Self {
            orchestrator: RetryOrchestrator::new(breakers),
            ..self.clone()
        }
    }

    /// Add a request interceptor, run before every attempt.
    pub fn with_request_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: RequestInterceptor + 'static,
    {
        Arc::make_mut(&mut self.interceptors).push_request(Arc::new(interceptor));
        self
    }

    /// Add a response interceptor, run after every attempt.
    pub fn with_response_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: ResponseInterceptor + 'static,
    {
        Arc::make_mut(&mut self.interceptors).push_response(Arc::new(interceptor));
        self
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, url.into())
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, url.into())
    }

    /// Create a PUT request builder.
    pub fn put(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, url.into())
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PATCH, url.into())
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, url.into())
    }

    /// Create a HEAD request builder.
    pub fn head(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::HEAD, url.into())
    }

    /// Create a request builder with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    /// Execute a request with retry and circuit breaker logic.
    pub(crate) async fn execute(
        &self,
        request: Request,
        options: &RetryOptions,
        control: &CallControl,
        validator: &StatusValidator,
    ) -> Result<Response> {
        let endpoint = EndpointKey::from_request(request.method(), request.url());
        debug!(endpoint = %endpoint, max_retries = options.max_retries, "Executing request");

        let this = self;
        let request = &request;
        self.orchestrator
            .execute(options, &endpoint, control, validator, move || {
                this.execute_once(request)
            })
            .await
    }

    /// Send one attempt of `request`.
    async fn execute_once(&self, request: &Request) -> Result<Response> {
        let request = request.try_clone().ok_or_else(|| {
            HttpClientError::RequestBuild("request body cannot be replayed".to_string())
        })?;

        let request = self.interceptors.apply_request(request).await?;
        let timeout = request.timeout().copied().unwrap_or(self.config.timeout);

        let response = self
            .inner
            .execute(request)
            .await
            .map_err(|e| transport_error(e, timeout))?;
        let response = Response::from_reqwest(response)
            .await
            .map_err(|e| transport_error(e, timeout))?;
        self.interceptors.apply_response(response).await
    }
}

/// Map a reqwest failure onto the client's error taxonomy.
fn transport_error(error: reqwest::Error, timeout: Duration) -> HttpClientError {
    if error.is_timeout() {
        HttpClientError::Timeout(timeout)
    } else if error.is_connect() {
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        HttpClientError::Connection(message)
    } else {
        HttpClientError::Http(error)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("breakers", &self.breakers().len())
            .field("interceptors", &self.interceptors)
            .finish()
    }
}
