//! HTTP response wrapper.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::classify::AttemptResponse;
use crate::{HttpClientError, Result};

/// HTTP response with a fully buffered body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: url::Url,
}

impl Response {
    /// Create a response from its parts.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
        url: url::Url,
    ) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url,
        }
    }

    /// Buffer a reqwest response.
    pub(crate) async fn from_reqwest(
        response: reqwest::Response,
    ) -> std::result::Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the response headers mutably, for response interceptors.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the response URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body, for response interceptors.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Consume the response and return the body as bytes.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Json(e.to_string()))
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Return an error for 4xx and 5xx responses.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            Err(self.into_status_error())
        } else {
            Ok(self)
        }
    }
}

impl AttemptResponse for Response {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn into_status_error(self) -> HttpClientError {
        let message = match std::str::from_utf8(&self.body) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => self
                .status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string(),
        };

        HttpClientError::Status {
            status: self.status,
            message,
            headers: self.headers,
        }
    }
}
