//! Minimal relay example — JSON endpoints, error rendering and health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -H 'accept: application/json' 'http://localhost:3000/users?per_page=0'
//!   curl -X POST http://localhost:3000/users -d ''
//!   curl http://localhost:3000/users/0
//!   curl http://localhost:3000/healthz
//!
//! Diagnostics (optional):
//!   DIAGNOSTICS_ENABLED=true DIAGNOSTICS_USERNAME=ops DIAGNOSTICS_PASSWORD=s3cret \
//!     cargo run --example basic
//!   curl -u ops:s3cret http://localhost:3000/debug/build

use http::StatusCode;
use relay::diagnostics::{self, DiagnosticsConfig};
use relay::middleware::{ErrorMiddleware, JsonContentType, LoggingMiddleware, RequestIdMiddleware};
use relay::{BoxFuture, FieldErrors, Failure, Request, ResponseWriter, Router, Server, health};

#[tokio::main]
async fn main() -> Result<(), relay::Error> {
    tracing_subscriber::fmt::init();

    let mut app = Router::new()
        .get("/healthz", health::liveness)
        .get("/readyz",  health::readiness)
        .with(ErrorMiddleware::new())
        .with(RequestIdMiddleware)
        .with(LoggingMiddleware::new("api"))
        .with(JsonContentType)
        .get("/users",      list_users)
        .get("/users/{id}", get_user)
        .post("/users",     create_user);

    if let Some(debug) = diagnostics::router(&DiagnosticsConfig::from_env()?) {
        app = app.merge(debug);
    }

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /users?per_page=N
fn list_users(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_> {
    Box::pin(async move {
        let per_page = req
            .uri()
            .query()
            .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("per_page=")))
            .unwrap_or("20");

        match per_page.parse::<u32>() {
            Ok(0) => Err(Failure::Validation(
                FieldErrors::new().with("per_page", "must be greater than 0"),
            )),
            Ok(_) => {
                w.write(br#"[{"id":"42","name":"alice"}]"#);
                Ok(())
            }
            Err(_) => Err(Failure::BadRequest(
                FieldErrors::new().with("per_page", "must be a number"),
            )),
        }
    })
}

// GET /users/{id}
fn get_user(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_> {
    Box::pin(async move {
        let id = req.param("id").unwrap_or("unknown");
        if id == "0" {
            // Upstream unavailable: keep 502, the error layer adds the body.
            w.write_header(StatusCode::BAD_GATEWAY);
            return Err(Failure::msg("user directory unreachable").context("loading user 0"));
        }
        w.write(format!(r#"{{"id":"{id}","name":"alice"}}"#).as_bytes());
        Ok(())
    })
}

// POST /users
fn create_user(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_> {
    Box::pin(async move {
        if req.body().is_empty() {
            return Err(Failure::BadRequest(FieldErrors::new().with("body", "is required")));
        }
        w.write_header(StatusCode::CREATED);
        w.set_header("location", http::HeaderValue::from_static("/users/99"));
        w.write(br#"{"id":"99","name":"new_user"}"#);
        Ok(())
    })
}
