//! Middleware layer.
//!
//! Middleware wraps a handler in another handler and is the right place for
//! cross-cutting concerns: error rendering, request logging, request-id
//! injection, authentication-header inspection.
//!
//! A [`Middleware`] is applied once per route, when the route is registered,
//! and the resulting chain is reused for every request. The first middleware
//! passed to [`Router::with`](crate::Router::with) is the outermost layer:
//!
//! ```text
//! Router::new().with(a).with(b).get("/", h)
//!
//! request  → a → b → h
//! response ← a ← b ← h
//! ```
//!
//! Built-in middleware:
//! - [`ErrorMiddleware`] — panic containment, failure classification, error bodies, alerts
//! - [`LoggingMiddleware`] — per-request span with method, path, status, latency
//! - [`RequestIdMiddleware`] — `x-request-id` correlation
//! - [`JsonContentType`] — `content-type: application/json` on every response
//! - [`BasicAuthMiddleware`] — HTTP Basic credentials check

mod basic_auth;
mod content_type;
mod error;
mod logging;
mod request_id;

pub use basic_auth::BasicAuthMiddleware;
pub use content_type::JsonContentType;
pub use error::ErrorMiddleware;
pub use logging::LoggingMiddleware;
pub use request_id::{REQUEST_ID_HEADER, RequestIdMiddleware};

use crate::handler::BoxedHandler;

/// Turns one handler into another.
///
/// Implemented automatically for `Fn(BoxedHandler) -> BoxedHandler`
/// closures, and by hand for configurable middleware structs.
pub trait Middleware: Send + Sync + 'static {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        (self)(next)
    }
}
