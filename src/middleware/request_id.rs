//! Request correlation IDs.

use std::sync::Arc;

use http::HeaderValue;
use uuid::Uuid;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Header carrying the correlation ID in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Propagates the caller's `x-request-id`, or generates a UUID v4 when it is
/// missing or empty.
///
/// The ID is written back onto the request headers, stored in the request
/// context and echoed on the response. Register it before
/// [`LoggingMiddleware`](super::LoggingMiddleware) so the span picks it up.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(RequestIdHandler { next })
    }
}

struct RequestIdHandler {
    next: BoxedHandler,
}

impl Handler for RequestIdHandler {
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, mut req: Request) -> BoxFuture<'a> {
        let id = match req.header(REQUEST_ID_HEADER) {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => Uuid::new_v4().to_string(),
        };

        // Incoming values were valid header values; generated ones are hex.
        if let Ok(value) = HeaderValue::from_str(&id) {
            req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
            w.set_header(REQUEST_ID_HEADER, value);
        }
        req.context().set_request_id(id);

        self.next.call(w, req)
    }
}
