//! Request and response interceptors.
//!
//! Interceptors run on every attempt, in the order they were added. An
//! interceptor error aborts the call and is never retried.

use async_trait::async_trait;
use reqwest::Request;
use std::sync::Arc;

use crate::{Response, Result};

/// Request interceptor, run before each attempt is sent.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Inspect, modify or reject the request.
    async fn intercept(&self, request: Request) -> Result<Request>;
}

/// Response interceptor, run after each attempt's response is buffered.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// Inspect, modify or reject the response.
    async fn intercept(&self, response: Response) -> Result<Response>;
}

#[async_trait]
impl<F> RequestInterceptor for F
where
    F: Fn(Request) -> Result<Request> + Send + Sync,
{
    async fn intercept(&self, request: Request) -> Result<Request> {
        self(request)
    }
}

#[async_trait]
impl<F> ResponseInterceptor for F
where
    F: Fn(Response) -> Result<Response> + Send + Sync,
{
    async fn intercept(&self, response: Response) -> Result<Response> {
        self(response)
    }
}

/// Ordered interceptors of a client.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl InterceptorChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request interceptor.
    pub fn push_request(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.push(interceptor);
    }

    /// Append a response interceptor.
    pub fn push_response(&mut self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.push(interceptor);
    }

    /// Number of interceptors, request and response combined.
    pub fn len(&self) -> usize {
        self.request.len() + self.response.len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every request interceptor.
    pub async fn apply_request(&self, mut request: Request) -> Result<Request> {
        for interceptor in &self.request {
            request = interceptor.intercept(request).await?;
        }
        Ok(request)
    }

    /// Run every response interceptor.
    pub async fn apply_response(&self, mut response: Response) -> Result<Response> {
        for interceptor in &self.response {
            response = interceptor.intercept(response).await?;
        }
        Ok(response)
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .finish()
    }
}

/// Logging interceptor that logs requests and responses.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor {
    log_headers: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

#[async_trait]
impl RequestInterceptor for LoggingInterceptor {
    async fn intercept(&self, request: Request) -> Result<Request> {
        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            "Sending HTTP request"
        );

        if self.log_headers {
            for (name, value) in request.headers() {
                tracing::trace!(header = %name, value = ?value, "Request header");
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl ResponseInterceptor for LoggingInterceptor {
    async fn intercept(&self, response: Response) -> Result<Response> {
        tracing::debug!(
            status = %response.status(),
            url = %response.url(),
            "Received HTTP response"
        );

        if self.log_headers {
            for (name, value) in response.headers() {
                tracing::trace!(header = %name, value = ?value, "Response header");
            }
        }

        Ok(response)
    }
}
