//! Incoming HTTP request type and its request-scoped context.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use tracing::Span;

/// Values scoped to one request, set by middleware for the layers around
/// and inside it.
///
/// Built empty when the request arrives. [`RequestIdMiddleware`] fills in the
/// correlation ID and [`LoggingMiddleware`] the span; handlers read both.
///
/// Clones share one set of values: an outer layer that keeps a clone before
/// calling `next` sees what the inner layers stored.
///
/// [`RequestIdMiddleware`]: crate::middleware::RequestIdMiddleware
/// [`LoggingMiddleware`]: crate::middleware::LoggingMiddleware
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    values: Arc<Mutex<ContextValues>>,
}

#[derive(Debug)]
struct ContextValues {
    request_id: Option<String>,
    span: Span,
}

impl Default for ContextValues {
    fn default() -> Self {
        Self { request_id: None, span: Span::none() }
    }
}

impl RequestContext {
    // Only plain assignments happen under the lock, so a poisoned value is
    // still consistent.
    fn values(&self) -> MutexGuard<'_, ContextValues> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_id(&self) -> Option<String> {
        self.values().request_id.clone()
    }

    /// The request's logging span. `Span::none()` until a logging layer runs.
    pub fn span(&self) -> Span {
        self.values().span.clone()
    }

    pub fn set_request_id(&self, id: impl Into<String>) {
        self.values().request_id = Some(id.into());
    }

    pub fn set_span(&self, span: Span) {
        self.values().span = span;
    }
}

/// An incoming HTTP request with its body fully read.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
    context: RequestContext,
}

impl Request {
    /// Wraps an `http::Request` whose body has already been collected.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr: None,
            context: RequestContext::default(),
        }
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header lookup (names are case-insensitive). `None` for absent or
    /// non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
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

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Shorthand for `context().request_id()`.
    pub fn request_id(&self) -> Option<String> {
        self.context.request_id()
    }
}
