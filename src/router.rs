//! Radix-tree request router with a middleware chain.
//!
//! One tree per HTTP method plus one for method-agnostic routes. O(path-length)
//! lookup. Middleware is composed around each handler when the route is
//! registered, never per request.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::Full;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::ResponseWriter;

/// A registered route, kept so routers can be merged.
struct Route {
    method: Option<Method>,
    path: String,
    handler: BoxedHandler,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
///
/// ```rust,no_run
/// # use relay::{BoxFuture, Request, ResponseWriter, Router};
/// # use relay::middleware::{ErrorMiddleware, LoggingMiddleware, RequestIdMiddleware};
/// # fn get_user(_: &mut ResponseWriter, _: Request) -> BoxFuture<'_> { Box::pin(async { Ok(()) }) }
/// # fn create_user(_: &mut ResponseWriter, _: Request) -> BoxFuture<'_> { Box::pin(async { Ok(()) }) }
/// let app = Router::new()
///     .with(ErrorMiddleware::new())      // outermost: runs first, unwinds last
///     .with(RequestIdMiddleware)
///     .with(LoggingMiddleware::new("api"))
///     .get("/users/{id}", get_user)
///     .post("/users",     create_user);
/// ```
#[derive(Default)]
pub struct Router {
    middleware: Vec<Arc<dyn Middleware>>,
    routes: Vec<Route>,
    by_method: HashMap<Method, MatchitRouter<BoxedHandler>>,
    any_method: MatchitRouter<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. Registration order is execution order: the
    /// first `with` is the outermost layer.
    ///
    /// Only routes registered *after* this call are wrapped.
    pub fn with(self, middleware: impl Middleware) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Appends an already shared middleware. Passing the same instance twice
    /// applies it twice.
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Registers a handler for every method on `path`.
    pub fn handle(self, path: &str, handler: impl Handler) -> Self {
        let composed = self.compose(Arc::new(handler));
        self.insert(None, path, composed)
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with a route
    /// already registered for the same method.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        let composed = self.compose(Arc::new(handler));
        self.insert(Some(method), path, composed)
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Moves every route of `other` into `self`, keeping each route's own
    /// middleware chain. `self`'s middleware is not applied to them.
    pub fn merge(mut self, other: Router) -> Self {
        for route in other.routes {
            self = self.insert(route.method, &route.path, route.handler);
        }
        self
    }

    /// Wraps `handler` in the registered middleware, first one outermost.
    fn compose(&self, handler: BoxedHandler) -> BoxedHandler {
        self.middleware
            .iter()
            .rev()
            .fold(handler, |next, middleware| middleware.apply(next))
    }

    fn insert(mut self, method: Option<Method>, path: &str, handler: BoxedHandler) -> Self {
        let tree = match &method {
            Some(m) => self.by_method.entry(m.clone()).or_default(),
            None => &mut self.any_method,
        };
        tree.insert(path, Arc::clone(&handler))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.routes.push(Route { method, path: path.to_owned(), handler });
        self
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let matched = self
            .by_method
            .get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any_method.at(path).ok())?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// Routes one request through its composed chain and finishes the
    /// response.
    ///
    /// Unmatched requests get `404`. A failure that no layer rendered leaves
    /// the status at `500` unless something already set one.
    pub async fn dispatch(&self, mut req: Request) -> http::Response<Full<Bytes>> {
        let mut w = ResponseWriter::new();

        match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.set_params(params);
                if let Err(failure) = handler.call(&mut w, req).await {
                    w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                    debug!(error = %failure, "request finished with a failure");
                }
            }
            None => w.write_header(StatusCode::NOT_FOUND),
        }

        w.into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http_body_util::BodyExt;

    use super::*;
    use crate::failure::Failure;
    use crate::handler::BoxFuture;

    /// Records `>name` on the way in and `<name` on the way out.
    struct Trace {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    struct TraceHandler {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        next: BoxedHandler,
    }

    impl Middleware for Trace {
        fn apply(&self, next: BoxedHandler) -> BoxedHandler {
            Arc::new(TraceHandler { name: self.name, log: Arc::clone(&self.log), next })
        }
    }

    impl Handler for TraceHandler {
        fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!(">{}", self.name));
                let result = self.next.call(w, req).await;
                self.log.lock().unwrap().push(format!("<{}", self.name));
                result
            })
        }
    }

    fn trace(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Trace {
        Trace { name, log: Arc::clone(log) }
    }

    fn user(w: &mut ResponseWriter, req: Request) -> BoxFuture<'_> {
        Box::pin(async move {
            let id = req.param("id").unwrap_or("unknown").to_owned();
            w.write(id.as_bytes());
            Ok(())
        })
    }

    fn failing(_w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
        Box::pin(async move { Err(Failure::msg("unrendered")) })
    }

    fn request(method: Method, uri: &str) -> Request {
        let req = http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap();
        Request::from_http(req)
    }

    async fn body(response: http::Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn execution_order_is_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .with(trace("a", &log))
            .with(trace("b", &log))
            .with(trace("c", &log))
            .get("/users/{id}", user);

        let response = router.dispatch(request(Method::GET, "/users/7")).await;
        assert_eq!(body(response).await, "7");
        assert_eq!(*log.lock().unwrap(), [">a", ">b", ">c", "<c", "<b", "<a"]);
    }

    #[tokio::test]
    async fn later_middleware_keeps_earlier_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .with(trace("a", &log))
            .get("/early", user)
            .with(trace("b", &log))
            .get("/late", user);

        router.dispatch(request(Method::GET, "/early")).await;
        assert_eq!(*log.lock().unwrap(), [">a", "<a"]);

        log.lock().unwrap().clear();
        router.dispatch(request(Method::GET, "/late")).await;
        assert_eq!(*log.lock().unwrap(), [">a", ">b", "<b", "<a"]);
    }

    #[tokio::test]
    async fn shared_middleware_applies_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared: Arc<dyn Middleware> = Arc::new(trace("x", &log));
        let router = Router::new()
            .with_shared(Arc::clone(&shared))
            .with_shared(shared)
            .get("/", user);

        router.dispatch(request(Method::GET, "/")).await;
        assert_eq!(*log.lock().unwrap(), [">x", ">x", "<x", "<x"]);
    }

    #[tokio::test]
    async fn no_middleware_calls_handler_directly() {
        let router = Router::new().get("/users/{id}", user);
        let response = router.dispatch(request(Method::GET, "/users/9")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, "9");
    }

    #[tokio::test]
    async fn closures_work_as_middleware() {
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let router = Router::new()
            .with(move |next: BoxedHandler| {
                *counter.lock().unwrap() += 1;
                next
            })
            .get("/a", user)
            .get("/b", user);

        router.dispatch(request(Method::GET, "/a")).await;
        router.dispatch(request(Method::GET, "/a")).await;
        // Applied once per registered route, not per request.
        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn handle_matches_any_method() {
        let router = Router::new()
            .handle("/any/{id}", user)
            .post("/any/{id}", failing);

        let got = router.dispatch(request(Method::PATCH, "/any/3")).await;
        assert_eq!(body(got).await, "3");

        let posted = router.dispatch(request(Method::POST, "/any/3")).await;
        assert_eq!(posted.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unmatched_is_404() {
        let router = Router::new().get("/users/{id}", user);
        let response = router.dispatch(request(Method::GET, "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let wrong_method = router.dispatch(request(Method::DELETE, "/users/1")).await;
        assert_eq!(wrong_method.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn merge_keeps_each_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let admin = Router::new().with(trace("admin", &log)).get("/admin", user);
        let router = Router::new()
            .with(trace("api", &log))
            .get("/api", user)
            .merge(admin);

        router.dispatch(request(Method::GET, "/admin")).await;
        assert_eq!(*log.lock().unwrap(), [">admin", "<admin"]);
    }

    #[test]
    #[should_panic(expected = "invalid route `/users/{name}`")]
    fn conflicting_routes_panic() {
        let _ = Router::new().get("/users/{id}", user).get("/users/{name}", user);
    }
}
