//! Request builder.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::classify::StatusValidator;
use crate::control::CallControl;
use crate::retry::RetryOptions;
use crate::{HttpClient, HttpClientError, Response, Result};

/// HTTP request builder.
///
/// Settings made here override the client's for this call only.
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    retry: Option<RetryOptions>,
    validator: Option<StatusValidator>,
    control: CallControl,
    error: Option<HttpClientError>,
}

impl<'a> RequestBuilder<'a> {
    /// Create a new request builder.
    pub(crate) fn new(client: &'a HttpClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
            retry: None,
            validator: None,
            control: CallControl::new(),
            error: None,
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(HttpClientError::RequestBuild(format!(
                "invalid header `{name}`"
            ))),
        }
        self
    }

    /// Add multiple headers to the request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add multiple query parameters.
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in params {
            self.query.push((k.into(), v.into()));
        }
        self
    }

    /// Set the request body as raw bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the request body as text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self.body = Some(Bytes::from(text.into()));
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => {
                self.headers
                    .entry(http::header::CONTENT_TYPE)
                    .or_insert(HeaderValue::from_static("application/json"));
                self.body = Some(Bytes::from(bytes));
            }
            Err(e) => self.fail(HttpClientError::Json(e.to_string())),
        }
        self
    }

    /// Set the request body as form data.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        match serde_urlencoded::to_string(form) {
            Ok(encoded) => {
                self.headers.insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                self.body = Some(Bytes::from(encoded));
            }
            Err(e) => self.fail(HttpClientError::RequestBuild(e.to_string())),
        }
        self
    }

    /// Set the timeout of each attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set bearer authentication.
    pub fn bearer_auth(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// Set basic authentication.
    pub fn basic_auth(
        self,
        username: impl Into<String>,
        password: Option<impl Into<String>>,
    ) -> Self {
        use base64::Engine;
        let credentials = match password {
            Some(p) => format!("{}:{}", username.into(), p.into()),
            None => format!("{}:", username.into()),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        self.header("Authorization", format!("Basic {}", encoded))
    }

    /// Use these retry options instead of the client's.
    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.retry = Some(options);
        self
    }

    /// Send this request exactly once, without the circuit breaker.
    pub fn no_retry(self) -> Self {
        self.retry(RetryOptions::none())
    }

    /// Use this status validator instead of the client's.
    pub fn status_validator(mut self, validator: StatusValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Abort the call, including any backoff wait, when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.control = self.control.with_cancellation(token);
        self
    }

    /// Abort the call at `deadline`.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.control = self.control.with_deadline(deadline);
        self
    }

    /// Abort the call once `timeout` has elapsed, retries included.
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.control = self.control.with_timeout(timeout);
        self
    }

    fn fail(&mut self, error: HttpClientError) {
        self.error.get_or_insert(error);
    }

    /// Build the URL with query parameters.
    fn build_url(&self) -> Result<url::Url> {
        let mut url = match url::Url::parse(&self.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.client.config().base_url.as_deref().ok_or_else(|| {
                    HttpClientError::InvalidUrl(format!(
                        "relative URL `{}` without base URL",
                        self.url
                    ))
                })?;
                let joined = format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    self.url.trim_start_matches('/')
                );
                url::Url::parse(&joined)
                    .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?
            }
            Err(e) => return Err(HttpClientError::InvalidUrl(e.to_string())),
        };

        if !self.query.is_empty() {
            let mut query_pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                query_pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Send the request.
    pub async fn send(mut self) -> Result<Response> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        let url = self.build_url()?;
        let config = self.client.config();

        let mut request = self.client.inner().request(self.method, url);
        for (name, value) in &config.default_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = request.headers(self.headers);
        if let Some(body) = self.body {
            request = request.body(body);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let options = self.retry.unwrap_or_else(|| config.retry_options());
        let validator = self
            .validator
            .unwrap_or_else(|| config.status_validator.clone());
        let control = match config.total_timeout {
            Some(total) => self.control.with_timeout(total),
            None => self.control,
        };

        self.client
            .execute(request.build()?, &options, &control, &validator)
            .await
    }

    /// Send the request and parse the response body as JSON.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<T> {
        self.send().await?.json()
    }
}
