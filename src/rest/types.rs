//! Request and response values exchanged between the transport and the resources

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use super::status::HttpStatus;

/// Content type for JSON bodies
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for plain-text (hex TLV) bodies
pub const CONTENT_TYPE_PLAIN: &str = "text/plain";

/// Header consulted for the requested representation
pub const ACCEPT_HEADER: &str = "accept";

/// Header describing the body representation
pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// Methods understood by the resource table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
}

impl HttpMethod {
    /// Parse an HTTP method token, returning `None` for methods outside the table
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            "POST" => Some(Self::Post),
            "DELETE" => Some(Self::Delete),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }

    /// Whether the method changes resource state
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Put | Self::Post | Self::Delete)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request, immutable once built
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    received_at: Instant,
}

impl Request {
    /// Create a request with no headers and an empty body
    pub fn new(method: HttpMethod, path: impl Into<String>, received_at: Instant) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: Vec::new(),
            received_at,
        }
    }

    /// Add a header; names are matched case-insensitively
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub const fn received_at(&self) -> Instant {
        self.received_at
    }

    /// Header value, or an empty string when absent
    #[must_use]
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map_or("", String::as_str)
    }

    /// Whether the media type of `name` is `media_type`, ignoring parameters
    #[must_use]
    pub fn header_is(&self, name: &str, media_type: &str) -> bool {
        self.header(name)
            .split(';')
            .next()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(media_type))
    }
}

/// A response under construction
///
/// Handlers may mutate it any number of times. Once [`Response::set_complete`]
/// has been called it is frozen: later mutations are ignored. Only complete
/// responses may be handed to the transport.
#[derive(Debug, Clone)]
pub struct Response {
    status: HttpStatus,
    content_type: &'static str,
    body: Vec<u8>,
    complete: bool,
    pending_since: Option<Instant>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Create an empty, incomplete `200 OK` JSON response
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: HttpStatus::Ok,
            content_type: CONTENT_TYPE_JSON,
            body: Vec::new(),
            complete: false,
            pending_since: None,
        }
    }

    pub fn set_status(&mut self, status: HttpStatus) {
        if self.frozen("status") {
            return;
        }
        self.status = status;
    }

    pub fn set_content_type(&mut self, content_type: &'static str) {
        if self.frozen("content type") {
            return;
        }
        self.content_type = content_type;
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        if self.frozen("body") {
            return;
        }
        self.body = body.into();
    }

    /// Mark the response as finished; it becomes immutable
    pub fn set_complete(&mut self) {
        self.complete = true;
    }

    /// Mark the response as requiring deferred completion, starting its window at `now`
    pub fn set_callback(&mut self, now: Instant) {
        if self.frozen("callback") {
            return;
        }
        self.pending_since = Some(now);
    }

    /// Replace the body with the mapped error body and complete
    pub fn set_error(&mut self, status: HttpStatus) {
        self.set_status(status);
        self.set_content_type(CONTENT_TYPE_JSON);
        self.set_body(status.error_body());
        self.set_complete();
    }

    #[must_use]
    pub const fn status(&self) -> HttpStatus {
        self.status
    }

    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.content_type
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the response, returning its body
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether completion is deferred to the completion poller
    #[must_use]
    pub const fn needs_callback(&self) -> bool {
        self.pending_since.is_some()
    }

    /// When the pending window opened, if any
    #[must_use]
    pub const fn start_time(&self) -> Option<Instant> {
        self.pending_since
    }

    fn frozen(&self, what: &str) -> bool {
        if self.complete {
            tracing::debug!(field = what, "ignoring mutation of completed response");
        }
        self.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_methods() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("OPTIONS"), Some(HttpMethod::Options));
        assert_eq!(HttpMethod::parse("PATCH"), None);
        assert!(HttpMethod::Delete.is_mutating());
        assert!(!HttpMethod::Options.is_mutating());
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(HttpMethod::Get, "/node", Instant::now())
            .with_header("Accept", "text/plain; charset=utf-8");
        assert!(req.header_is("ACCEPT", CONTENT_TYPE_PLAIN));
        assert_eq!(req.header("content-type"), "");
    }

    #[test]
    fn completed_response_is_frozen() {
        let mut resp = Response::new();
        resp.set_body("first");
        resp.set_complete();
        resp.set_body("second");
        resp.set_status(HttpStatus::Conflict);
        resp.set_callback(Instant::now());

        assert_eq!(resp.body(), b"first");
        assert_eq!(resp.status(), HttpStatus::Ok);
        assert!(!resp.needs_callback());
    }

    #[test]
    fn error_completes_with_mapped_body() {
        let mut resp = Response::new();
        resp.set_error(HttpStatus::MethodNotAllowed);

        assert!(resp.is_complete());
        assert_eq!(resp.status(), HttpStatus::MethodNotAllowed);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["ErrorCode"], 405);
    }
}
