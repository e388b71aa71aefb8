//! Error layer: panic containment, rendering, logging and alerting.
//!
//! This is the single place where a [`Failure`] becomes a response body and
//! a log entry. Register it first so it wraps everything else:
//!
//! ```rust,no_run
//! use relay::Router;
//! use relay::middleware::{ErrorMiddleware, LoggingMiddleware};
//!
//! let app = Router::new()
//!     .with(ErrorMiddleware::new())
//!     .with(LoggingMiddleware::new("api"));
//! ```

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::time::Instant;

use futures::FutureExt;
use http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::alert::{AlertSink, LogAlerts, RequestSummary, Severity};
use crate::failure::Failure;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::render;
use crate::request::Request;
use crate::response::ResponseWriter;

/// Renders failures returned (or panics raised) by the layers inside it.
#[derive(Clone)]
pub struct ErrorMiddleware {
    alerts: Arc<dyn AlertSink>,
}

impl ErrorMiddleware {
    /// Error layer alerting through [`LogAlerts`].
    ///
    /// The first error layer built installs a process-wide panic hook that
    /// records a backtrace for the panicking thread, then runs the hook that
    /// was installed before it. Capture follows `RUST_BACKTRACE`, as the
    /// default hook does, and applies to every panic in the process.
    pub fn new() -> Self {
        Self::with_alerts(Arc::new(LogAlerts))
    }

    pub fn with_alerts(alerts: Arc<dyn AlertSink>) -> Self {
        install_backtrace_hook();
        Self { alerts }
    }
}

impl Default for ErrorMiddleware {
    fn default() -> Self { Self::new() }
}

impl Middleware for ErrorMiddleware {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(ErrorHandler { next, alerts: Arc::clone(&self.alerts) })
    }
}

struct ErrorHandler {
    next: BoxedHandler,
    alerts: Arc<dyn AlertSink>,
}

impl Handler for ErrorHandler {
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
        Box::pin(async move {
            let started = Instant::now();
            let context = req.context().clone();
            let accept = req.header("accept").map(str::to_owned);
            let mut summary = RequestSummary {
                method: req.method().clone(),
                path: req.path().to_owned(),
                request_id: None,
                status: StatusCode::INTERNAL_SERVER_ERROR,
            };

            let outcome = AssertUnwindSafe(self.next.call(w, req)).catch_unwind().await;

            // Inner layers have filled the shared context by now.
            let span = context.span();
            summary.request_id = context.request_id();

            let (failure, severity) = match outcome {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(failure)) => (failure, None),
                Err(payload) => {
                    let failure = Failure::Panic(panic_message(payload.as_ref()));
                    let backtrace = take_backtrace();
                    span.in_scope(|| {
                        error!(
                            method = %summary.method,
                            path = %summary.path,
                            error = %failure,
                            backtrace = %backtrace,
                            "handler panicked",
                        );
                    });
                    (failure, Some(Severity::Critical))
                }
            };

            let status = render::render(w, accept.as_deref(), &failure);
            summary.status = status;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            let request_id = summary.request_id.as_deref().unwrap_or("");

            span.in_scope(|| {
                if status.is_server_error() {
                    error!(method = %summary.method, path = %summary.path, status = status.as_u16(), elapsed_ms, request_id, error = %failure, details = ?failure, "request failed");
                } else if status.is_client_error() {
                    warn!(method = %summary.method, path = %summary.path, status = status.as_u16(), elapsed_ms, request_id, error = %failure, "request failed");
                } else {
                    info!(method = %summary.method, path = %summary.path, status = status.as_u16(), elapsed_ms, request_id, error = %failure, "request failed");
                }
            });

            if let Some(severity) = severity.or_else(|| Severity::for_status(status)) {
                if let Err(e) = self.alerts.alert(severity, &summary, &failure) {
                    debug!("alert sink failed: {e}");
                }
            }

            Err(failure)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

// ── Panic-site backtraces ─────────────────────────────────────────────────────
//
// By the time `catch_unwind` returns, the panicking frames are gone. A
// process-wide hook records the backtrace on the panicking thread; the
// future is polled on that same thread, so the error layer picks it up right
// after the catch. The previous hook still runs.

thread_local! {
    static PANIC_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

fn install_backtrace_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            PANIC_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::capture()));
            previous(info);
        }));
    });
}

fn take_backtrace() -> String {
    describe_backtrace(PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take()))
}

fn describe_backtrace(backtrace: Option<Backtrace>) -> String {
    match backtrace {
        Some(bt) if bt.status() == BacktraceStatus::Captured => bt.to_string(),
        _ => "<unavailable>".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::failure::{BoxError, FieldErrors};
    use crate::response::ContentType;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Severity, StatusCode)>>);

    impl AlertSink for Recorder {
        fn alert(&self, severity: Severity, request: &RequestSummary, _: &Failure) -> Result<(), BoxError> {
            self.0.lock().unwrap().push((severity, request.status));
            Ok(())
        }
    }

    struct Broken;

    impl AlertSink for Broken {
        fn alert(&self, _: Severity, _: &RequestSummary, _: &Failure) -> Result<(), BoxError> {
            Err("pager unreachable".into())
        }
    }

    fn wrap(handler: impl Handler, alerts: Arc<dyn AlertSink>) -> BoxedHandler {
        ErrorMiddleware::with_alerts(alerts).apply(Arc::new(handler))
    }

    fn get(accept: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/");
        if let Some(accept) = accept {
            builder = builder.header("accept", accept);
        }
        Request::from_http(builder.body(Bytes::new()).unwrap())
    }

    fn wrapped_error(_w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move { Err(Failure::msg("error").context("wrapping")) })
    }

    fn json_wrapped_error(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            w.set_content_type(ContentType::Json);
            Err(Failure::msg("error").context("wrapping"))
        })
    }

    fn validation(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            w.set_content_type(ContentType::Json);
            let errors = FieldErrors::new().with("test", "biniou");
            Err(Failure::Validation(errors).context("biniou"))
        })
    }

    fn already_written(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
            w.write(b"biniou\n");
            Err(Failure::msg("my error"))
        })
    }

    fn bad_gateway(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            w.write_header(StatusCode::BAD_GATEWAY);
            Err(Failure::msg("upstream closed the connection"))
        })
    }

    fn panics(_w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            let pool: Option<&str> = None;
            let _conn = pool.expect("database handle poisoned");
            Ok(())
        })
    }

    fn fine(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            w.write(b"ok");
            Ok(())
        })
    }

    async fn finish(handler: &BoxedHandler, req: Request) -> (StatusCode, Option<String>, String, Result<(), Failure>) {
        use http_body_util::BodyExt;

        let mut w = ResponseWriter::new();
        let result = handler.call(&mut w, req).await;
        let response = w.into_response();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap(), result)
    }

    #[tokio::test]
    async fn unset_status_becomes_500() {
        let recorder = Arc::new(Recorder::default());
        let handler = wrap(json_wrapped_error, recorder.clone());

        let (status, _, body, result) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "{\"error\":\"wrapping: error\"}\n");
        assert!(result.is_err());
        assert_eq!(*recorder.0.lock().unwrap(), vec![(Severity::Error, StatusCode::INTERNAL_SERVER_ERROR)]);
    }

    #[tokio::test]
    async fn validation_is_422_with_field_map() {
        let recorder = Arc::new(Recorder::default());
        let handler = wrap(validation, recorder.clone());

        let (status, _, body, _) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body, "{\"errors\":{\"test\":[\"biniou\"]}}\n");
        assert_eq!(*recorder.0.lock().unwrap(), vec![(Severity::Warning, StatusCode::UNPROCESSABLE_ENTITY)]);
    }

    #[tokio::test]
    async fn plain_text_when_nothing_negotiated() {
        let handler = wrap(wrapped_error, Arc::new(LogAlerts));

        let (status, content_type, body, _) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type.as_deref(), Some("text/plain"));
        assert_eq!(body, "wrapping: error\n");
    }

    #[tokio::test]
    async fn accept_header_selects_json() {
        let handler = wrap(wrapped_error, Arc::new(LogAlerts));

        let (_, content_type, body, _) = finish(&handler, get(Some("application/json"))).await;
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, "{\"error\":\"wrapping: error\"}\n");
    }

    #[tokio::test]
    async fn written_body_is_left_alone() {
        let handler = wrap(already_written, Arc::new(LogAlerts));

        let (status, content_type, body, result) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type, None);
        assert_eq!(body, "biniou\n");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handler_status_is_preserved() {
        let recorder = Arc::new(Recorder::default());
        let handler = wrap(bad_gateway, recorder.clone());

        let (status, _, body, _) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, "upstream closed the connection\n");
        assert_eq!(*recorder.0.lock().unwrap(), vec![(Severity::Error, StatusCode::BAD_GATEWAY)]);
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let recorder = Arc::new(Recorder::default());
        let handler = wrap(panics, recorder.clone());

        let (status, _, body, result) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "database handle poisoned\n");
        assert!(!body.contains("backtrace"));
        assert!(matches!(result, Err(Failure::Panic(_))));
        assert_eq!(*recorder.0.lock().unwrap(), vec![(Severity::Critical, StatusCode::INTERNAL_SERVER_ERROR)]);
    }

    #[tokio::test]
    async fn success_passes_through() {
        let recorder = Arc::new(Recorder::default());
        let handler = wrap(fine, recorder.clone());

        let (status, _, body, result) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        assert!(result.is_ok());
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn alert_sink_failure_is_swallowed() {
        let handler = wrap(wrapped_error, Arc::new(Broken));

        let (status, _, body, _) = finish(&handler, get(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "wrapping: error\n");
    }

    #[test]
    fn uncaptured_backtraces_are_unavailable() {
        assert_eq!(describe_backtrace(None), "<unavailable>");
        assert_eq!(describe_backtrace(Some(Backtrace::disabled())), "<unavailable>");
        assert_ne!(describe_backtrace(Some(Backtrace::force_capture())), "<unavailable>");
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "panic with non-string payload");
    }
}
