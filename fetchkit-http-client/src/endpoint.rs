//! Endpoint keys scoping circuit breaker state.

use http::Method;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Identifier of a logical remote resource.
///
/// Keys built with [`EndpointKey::from_request`] have the form
/// `METHOD scheme://host[:port]/path`. Query string, fragment, credentials and a
/// trailing slash are dropped, and `url` already lowercases scheme and host and
/// strips default ports, so repeated calls to the same resource share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey(Arc<str>);

impl EndpointKey {
    /// Create a key from an arbitrary string.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Derive the key for a request target.
    pub fn from_request(method: &Method, url: &Url) -> Self {
        let mut key = String::with_capacity(url.as_str().len() + 8);
        key.push_str(&method.as_str().to_ascii_uppercase());
        key.push(' ');
        key.push_str(url.scheme());
        key.push_str("://");
        if let Some(host) = url.host_str() {
            key.push_str(host);
        }
        if let Some(port) = url.port() {
            key.push(':');
            key.push_str(&port.to_string());
        }

        let path = url.path();
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            key.push('/');
        } else {
            key.push_str(trimmed);
        }

        Self(Arc::from(key))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EndpointKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EndpointKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for EndpointKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(method: Method, url: &str) -> EndpointKey {
        EndpointKey::from_request(&method, &Url::parse(url).unwrap())
    }

    #[test]
    fn test_key_ignores_query_and_trailing_slash() {
        let a = key(Method::GET, "https://API.example.com/users/?page=2");
        let b = key(Method::GET, "https://api.example.com/users#top");

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "GET https://api.example.com/users");
    }

    #[test]
    fn test_key_drops_default_port_keeps_custom() {
        assert_eq!(
            key(Method::GET, "https://example.com:443/").as_str(),
            "GET https://example.com/"
        );
        assert_eq!(
            key(Method::POST, "http://localhost:8080/orders").as_str(),
            "POST http://localhost:8080/orders"
        );
    }

    #[test]
    fn test_key_separates_methods_and_paths() {
        let get = key(Method::GET, "https://example.com/orders");
        let post = key(Method::POST, "https://example.com/orders");
        let other = key(Method::GET, "https://example.com/users");

        assert_ne!(get, post);
        assert_ne!(get, other);
    }
}
