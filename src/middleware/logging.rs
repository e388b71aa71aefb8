//! Per-request logging span.

use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use tracing::{Instrument, info, info_span};

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Opens one `request` span per request and logs its start and completion.
///
/// The span carries `router`, `method`, `path` and, when present, `host`,
/// `from`, `user_agent`, `referer` and `request_id`. It is stored in the
/// request context so inner layers and handlers log inside it.
///
/// Completion is logged with the final `status` (`200` if the handler never
/// set one), `duration` in seconds and `bytes` written.
#[derive(Clone, Debug)]
pub struct LoggingMiddleware {
    router: Arc<str>,
}

impl LoggingMiddleware {
    /// `router` names this router in every span, e.g. `"api"` or `"admin"`.
    pub fn new(router: impl Into<Arc<str>>) -> Self {
        Self { router: router.into() }
    }
}

impl Middleware for LoggingMiddleware {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(LoggingHandler { next, router: Arc::clone(&self.router) })
    }
}

struct LoggingHandler {
    next: BoxedHandler,
    router: Arc<str>,
}

impl Handler for LoggingHandler {
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
        let span = info_span!(
            "request",
            router = %self.router,
            method = %req.method(),
            path = %req.uri(),
            host = tracing::field::Empty,
            from = tracing::field::Empty,
            user_agent = tracing::field::Empty,
            referer = tracing::field::Empty,
            request_id = tracing::field::Empty,
        );
        let request_id = req.request_id();
        for (field, value) in [
            ("host", req.header("host")),
            ("user_agent", req.header("user-agent")),
            ("referer", req.header("referer")),
            ("request_id", request_id.as_deref()),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                span.record(field, value);
            }
        }
        if let Some(addr) = req.remote_addr() {
            span.record("from", tracing::field::display(addr));
        }
        req.context().set_span(span.clone());

        Box::pin(
            async move {
                let started = Instant::now();
                info!("starting request");

                let result = self.next.call(w, req).await;

                let status = w.status().unwrap_or(StatusCode::OK);
                info!(
                    status = status.as_u16(),
                    duration = started.elapsed().as_secs_f64(),
                    bytes = w.bytes_written(),
                    "request completed",
                );
                result
            }
            .instrument(span),
        )
    }
}
