//! Forces a JSON `Content-Type` on every response.

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};

/// Sets `content-type: application/json` before the handler runs.
///
/// Handlers behind it can still override the header. Error bodies rendered
/// further out follow it and come out as JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonContentType;

impl Middleware for JsonContentType {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(JsonContentTypeHandler { next })
    }
}

struct JsonContentTypeHandler {
    next: BoxedHandler,
}

impl Handler for JsonContentTypeHandler {
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
        w.set_content_type(ContentType::Json);
        self.next.call(w, req)
    }
}
