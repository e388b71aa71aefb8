//! HTTP Basic authentication.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};

use crate::failure::Failure;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::response::ResponseWriter;

type Verifier = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Rejects requests whose `Authorization: Basic` credentials the verifier
/// does not accept.
///
/// A rejected request gets `401` with `WWW-Authenticate` set, and the layer
/// returns [`Failure::Unauthorized`] so an outer
/// [`ErrorMiddleware`](super::ErrorMiddleware) renders the body.
#[derive(Clone)]
pub struct BasicAuthMiddleware {
    realm: HeaderValue,
    verify: Arc<Verifier>,
}

impl BasicAuthMiddleware {
    /// `verify(username, password)` decides.
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        Self { realm: HeaderValue::from_static(r#"Basic realm="restricted""#), verify: Arc::new(verify) }
    }

    /// Accepts exactly one username/password pair.
    pub fn single(username: impl Into<String>, password: impl Into<String>) -> Self {
        let (username, password) = (username.into(), password.into());
        Self::new(move |u, p| u == username && p == password)
    }
}

impl Middleware for BasicAuthMiddleware {
    fn apply(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(BasicAuthHandler {
            next,
            realm: self.realm.clone(),
            verify: Arc::clone(&self.verify),
        })
    }
}

struct BasicAuthHandler {
    next: BoxedHandler,
    realm: HeaderValue,
    verify: Arc<Verifier>,
}

impl Handler for BasicAuthHandler {
    fn call<'a>(&'a self, w: &'a mut ResponseWriter, req: Request) -> BoxFuture<'a> {
        let accepted = req
            .header(AUTHORIZATION.as_str())
            .and_then(credentials)
            .is_some_and(|(user, pass)| (self.verify)(&user, &pass));

        if accepted {
            return self.next.call(w, req);
        }

        w.set_header(WWW_AUTHENTICATE, self.realm.clone());
        w.write_header(StatusCode::UNAUTHORIZED);
        Box::pin(async move { Err(Failure::unauthorized("invalid credentials")) })
    }
}

/// Decodes `Basic <base64(user:pass)>`.
fn credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_owned(), pass.to_owned()))
}
