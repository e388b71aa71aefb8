//! # relay
//!
//! A request pipeline for hyper services: an ordered chain of middleware
//! around a terminal handler, and one place where every handler failure
//! becomes a correctly coded, correctly encoded response.
//!
//! ## The contract
//!
//! A handler gets the response sink and the request, and returns
//! `Result<(), Failure>`:
//!
//! - write the response yourself and return `Ok(())`, or
//! - return a [`Failure`] and let [`ErrorMiddleware`](middleware::ErrorMiddleware)
//!   pick the status and render the body.
//!
//! | Failure | Status |
//! |---|---|
//! | [`Failure::Validation`] | 422 |
//! | [`Failure::BadRequest`] | 400 |
//! | [`Failure::Unauthorized`] | 401 |
//! | [`Failure::Panic`] / [`Failure::Other`] | 500 |
//!
//! A status the handler already set always wins, and a body the handler
//! already wrote is never appended to. Error bodies are JSON when the
//! response `Content-Type` (or, failing that, the request `Accept`) is JSON,
//! plain text otherwise.
//!
//! What relay leaves to others: TLS, CORS, tracing exporters, rate limits.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use relay::middleware::{ErrorMiddleware, LoggingMiddleware, RequestIdMiddleware};
//! use relay::{BoxFuture, FieldErrors, Failure, Request, ResponseWriter, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), relay::Error> {
//!     let app = Router::new()
//!         .with(ErrorMiddleware::new())
//!         .with(RequestIdMiddleware)
//!         .with(LoggingMiddleware::new("api"))
//!         .get("/users", list_users);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! fn list_users(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_> {
//!     Box::pin(async move {
//!         if req.uri().query() == Some("per_page=0") {
//!             let errors = FieldErrors::new().with("per_page", "must be greater than 0");
//!             return Err(Failure::Validation(errors));
//!         }
//!         w.write(b"[]");
//!         Ok(())
//!     })
//! }
//! ```

mod error;
mod failure;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod alert;
pub mod diagnostics;
pub mod health;
pub mod middleware;
pub mod render;

pub use error::Error;
pub use failure::{BoxError, Context, FieldErrors, Failure};
pub use handler::{BoxFuture, BoxedHandler, Handler, HandlerFn, HandlerResult, handler_fn};
pub use middleware::Middleware;
pub use request::{Request, RequestContext};
pub use response::{ContentType, ResponseWriter};
pub use router::Router;
pub use server::Server;
