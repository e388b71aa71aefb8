//! Built-in Kubernetes health-check handlers.
//!
//! | Probe | Question |
//! |---|---|
//! | **Liveness** | Is the process alive? Failure → restart. |
//! | **Readiness** | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your router:
//!
//! ```rust,no_run
//! use relay::{Router, health};
//!
//! let app = Router::new()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Override `readiness` with your own handler if you need to gate on
//! dependency availability (database connections, downstream services, etc.).

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};

/// Kubernetes liveness probe handler.
///
/// Always `200 OK` with body `"ok"`. If the process can respond to HTTP at
/// all, it is alive.
pub fn liveness(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
    Box::pin(async move {
        w.set_content_type(ContentType::Text);
        w.write(b"ok");
        Ok(())
    })
}

/// Kubernetes readiness probe handler (default implementation).
///
/// `200 OK` with body `"ready"`.
pub fn readiness(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
    Box::pin(async move {
        w.set_content_type(ContentType::Text);
        w.write(b"ready");
        Ok(())
    })
}
