//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// An incoming HTTP request with its route parameters.
///
/// Cloning is cheap: the method, URI, headers and body live behind one
/// `Arc`. The dispatcher keeps a clone so fallback handlers see the same
/// request the route handler did.
#[derive(Clone, Debug)]
pub struct Request {
    parts: Arc<Parts>,
    params: Arc<HashMap<String, String>>,
}

#[derive(Debug)]
struct Parts {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// A request with no headers and an empty body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self::from_parts(method, uri, HeaderMap::new(), Bytes::new(), None)
    }

    pub fn from_parts(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            parts: Arc::new(Parts { method, uri, headers, body, remote_addr }),
            params: Arc::default(),
        }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &Bytes { &self.parts.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.parts.remote_addr }

    /// The request target as sent: path plus optional query string, still
    /// percent-encoded.
    pub fn target(&self) -> &str {
        self.parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_keeps_query_and_encoding() {
        let req = Request::new(Method::GET, "/search%20me?q=test".parse().unwrap());
        assert_eq!(req.target(), "/search%20me?q=test");
    }

    #[test]
    fn absolute_form_uri_yields_origin_target() {
        let req = Request::new(Method::GET, "http://example.com/a/b?x=1".parse().unwrap());
        assert_eq!(req.target(), "/a/b?x=1");
    }

    #[test]
    fn clones_share_parts_but_params_are_per_request() {
        let req = Request::new(Method::GET, "/users/42".parse().unwrap());
        let kept = req.clone();
        let routed = req.with_params(HashMap::from([("id".to_owned(), "42".to_owned())]));
        assert_eq!(routed.param("id"), Some("42"));
        assert_eq!(kept.param("id"), None);
        assert_eq!(kept.method(), routed.method());
    }
}
