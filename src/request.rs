//! Incoming HTTP request type.
//!
//! A [`Request`] is immutable once the router has matched it and cheap to
//! clone (one `Arc`), so every middleware and the terminal handler can hold
//! their own handle. Per-request mutable state lives on
//! [`Response::locals`](crate::Response::locals); terminal handlers read a
//! copy of it through [`Request::locals`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::method::Method;

/// An incoming HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    inner: Arc<Inner>,
}

#[derive(Clone, Debug)]
struct Inner {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    locals: Map<String, Value>,
}

impl Request {
    /// Builds a request by hand, e.g. to drive [`Router::dispatch`](crate::Router::dispatch)
    /// in-process.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                method,
                path: path.into(),
                headers: Vec::new(),
                body: Bytes::new(),
                params: HashMap::new(),
                locals: Map::new(),
            }),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        Arc::make_mut(&mut self.inner)
            .headers
            .push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        Arc::make_mut(&mut self.inner).body = body.into();
        self
    }

    pub(crate) fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        Arc::make_mut(&mut self.inner).headers = headers;
        self
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        Arc::make_mut(&mut self.inner).params = params;
        self
    }

    pub(crate) fn with_locals(mut self, locals: Map<String, Value>) -> Self {
        Arc::make_mut(&mut self.inner).locals = locals;
        self
    }

    pub fn method(&self) -> Method { self.inner.method }
    pub fn path(&self) -> &str { &self.inner.path }
    pub fn headers(&self) -> &[(String, String)] { &self.inner.headers }
    pub fn body(&self) -> &[u8] { &self.inner.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.inner.params.get(key).map(String::as_str)
    }

    /// The response locals as they were when the terminal handler was called.
    /// Empty everywhere else; middleware uses `res.locals()` instead.
    pub fn locals(&self) -> &Map<String, Value> {
        &self.inner.locals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(Method::Get, "/book").with_header("X-Role", "ADMIN");
        assert_eq!(req.header("x-role"), Some("ADMIN"));
        assert_eq!(req.header("x-missing"), None);
    }

    #[test]
    fn clones_do_not_observe_later_edits() {
        let req = Request::new(Method::Post, "/book");
        let copy = req.clone();
        let req = req.with_body("{}");
        assert_eq!(req.body(), b"{}");
        assert!(copy.body().is_empty());
    }
}
