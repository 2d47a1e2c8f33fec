//! Outgoing HTTP response type.
//!
//! A [`Response`] is created empty by the router and handed down the
//! middleware chain by value. Any middleware may *send* it (write a status and
//! body); once sent it is frozen and [`Response::headers_sent`] reports `true`,
//! which is how the terminal wrapper avoids answering twice.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde_json::{Map, Value};
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::bytes`].
pub enum ContentType {
    Csv,          // text/csv
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The in-flight HTTP response of one request.
///
/// ```rust
/// use http::StatusCode;
/// use serde_json::json;
/// use tsu_loader::Response;
///
/// let mut res = Response::new();
/// res.locals_mut().insert("role".into(), json!("ADMIN"));
/// res.json(StatusCode::CREATED, &json!({ "id": 42 }));
/// assert!(res.headers_sent());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
    sent: bool,
    locals: Map<String, Value>,
}

impl Response {
    /// An unsent `200 OK` with no body.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Bytes::new(),
            sent: false,
            locals: Map::new(),
        }
    }

    /// Whether some middleware already wrote this response.
    pub fn headers_sent(&self) -> bool { self.sent }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Request-scoped values shared between middleware (Express' `res.locals`).
    pub fn locals(&self) -> &Map<String, Value> { &self.locals }
    pub fn locals_mut(&mut self) -> &mut Map<String, Value> { &mut self.locals }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Adds a header. Ignored once the response has been sent.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.sent {
            warn!(header = name, "header set after response was sent, ignoring");
            return;
        }
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    /// Sends `body` serialised as `application/json`.
    pub fn json(&mut self, status: StatusCode, body: &Value) {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.send(status, ContentType::Json.as_str(), bytes.into()),
            Err(e) => {
                warn!("json serialisation failed: {e}");
                self.send_status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
    }

    /// Sends a `text/plain; charset=utf-8` body.
    pub fn text(&mut self, status: StatusCode, body: impl Into<String>) {
        self.send(status, ContentType::Text.as_str(), Bytes::from(body.into()));
    }

    /// Sends a typed body. Use this for XML, HTML, binary, etc.
    pub fn bytes(&mut self, status: StatusCode, content_type: ContentType, body: impl Into<Bytes>) {
        self.send(status, content_type.as_str(), body.into());
    }

    /// Sends a response with no body (e.g. `204 No Content`).
    pub fn send_status(&mut self, status: StatusCode) {
        if self.guard_sent() {
            return;
        }
        self.status = status;
        self.sent = true;
    }

    /// `204` and `304` never carry a body; it is discarded for them.
    fn send(&mut self, status: StatusCode, content_type: &str, body: Bytes) {
        if self.guard_sent() {
            return;
        }
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            self.send_status(status);
            return;
        }
        self.status = status;
        self.headers.insert(0, ("content-type".to_owned(), content_type.to_owned()));
        self.body = body;
        self.sent = true;
    }

    fn guard_sent(&self) -> bool {
        if self.sent {
            warn!(status = %self.status, "response already sent, ignoring second send");
        }
        self.sent
    }

    /// Converts into the hyper response written to the connection.
    ///
    /// Headers whose name or value is not valid on the wire are dropped.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(n), Ok(v)) => { res.headers_mut().append(n, v); }
                _ => warn!(header = %name, "dropping invalid response header"),
            }
        }
        res
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_send_wins() {
        let mut res = Response::new();
        res.json(StatusCode::CREATED, &json!({ "title": "sample" }));
        res.text(StatusCode::OK, "late");

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.body(), br#"{"title":"sample"}"#);
        assert_eq!(res.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn status_only_has_empty_body() {
        let mut res = Response::new();
        res.send_status(StatusCode::NO_CONTENT);
        assert!(res.headers_sent());
        assert!(res.body().is_empty());
    }

    #[test]
    fn no_content_discards_body() {
        let mut res = Response::new();
        res.json(StatusCode::NO_CONTENT, &json!({ "title": "sample" }));
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert_eq!(res.header("content-type"), None);
    }

    #[test]
    fn into_inner_drops_invalid_headers() {
        let mut res = Response::new();
        res.set_header("x-ok", "1");
        res.set_header("bad header", "1");
        res.text(StatusCode::OK, "hi");

        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::OK);
        assert_eq!(inner.headers().get("x-ok").unwrap(), "1");
        assert_eq!(inner.headers().len(), 2);
    }
}
