//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! The router holds handlers of *different* types in one table, and every
//! middleware layer wraps "some handler" without knowing which. Both need a
//! single type, so handlers are erased behind `Arc<dyn Handler>`.
//!
//! ```text
//! fn list(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_> { … }  ← user writes this
//!        ↓ router.get("/users", list)
//! Arc::new(list) as BoxedHandler                    ← one heap allocation, at setup
//!        ↓ middleware.apply(next) for each layer     ← composed once, at setup
//! handler.call(&mut w, req)  at request time        ← one vtable dispatch per layer
//! ```
//!
//! # Why the writer is borrowed
//!
//! Every layer sees the same [`ResponseWriter`], so what the handler wrote
//! is visible to the error renderer after it returns. The future borrows the
//! writer for `'a`; once it resolves the borrow ends and the outer layer can
//! inspect the writer again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::failure::Failure;
use crate::request::Request;
use crate::response::ResponseWriter;

/// What every handler and middleware layer resolves to.
pub type HandlerResult = Result<(), Failure>;

/// A heap-allocated, type-erased future borrowing the response writer.
///
/// `Send` lets tokio move the future across worker threads.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// The unit of request processing.
///
/// Implemented automatically for any function with the signature
///
/// ```text
/// fn name(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_>
/// ```
///
/// and implemented by hand for middleware layers that hold a `next` handler.
/// Closures go through [`handler_fn`] so their signature is inferred.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut ResponseWriter, Request) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
        (self)(w, req)
    }
}

/// Turns a closure into a [`Handler`].
///
/// ```rust
/// use relay::{Router, handler_fn};
///
/// let app = Router::new().get("/hello", handler_fn(|w, _req| Box::pin(async move {
///     w.write(b"hello");
///     Ok(())
/// })));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut ResponseWriter, Request) -> BoxFuture<'a> + Send + Sync + 'static,
{
    HandlerFn(f)
}

/// Handler returned by [`handler_fn`].
pub struct HandlerFn<F>(F);

impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut ResponseWriter, Request) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
        (self.0)(w, req)
    }
}
