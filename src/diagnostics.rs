//! Password-protected diagnostics endpoints, switched on from the environment.
//!
//! | Variable | Meaning |
//! |---|---|
//! | `DIAGNOSTICS_ENABLED` | `true` to expose the endpoints |
//! | `DIAGNOSTICS_USERNAME` | Basic auth username |
//! | `DIAGNOSTICS_PASSWORD` | Basic auth password |
//!
//! The group stays disabled unless all three are present and valid.
//!
//! ```rust,no_run
//! use relay::{Router, diagnostics};
//! use relay::diagnostics::DiagnosticsConfig;
//!
//! # fn main() -> Result<(), relay::Error> {
//! let mut app = Router::new();
//! if let Some(debug) = diagnostics::router(&DiagnosticsConfig::from_env()?) {
//!     app = app.merge(debug);
//! }
//! # Ok(()) }
//! ```

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::health;
use crate::middleware::{BasicAuthMiddleware, ErrorMiddleware};
use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};
use crate::router::Router;

/// Every diagnostics route lives under this prefix.
pub const ROUTE_PREFIX: &str = "/debug";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub username: String,
    pub password: String,
}

impl DiagnosticsConfig {
    /// Reads `DIAGNOSTICS_*` from the process environment.
    ///
    /// Missing variables keep their defaults (disabled, empty credentials).
    /// A `DIAGNOSTICS_ENABLED` that is not a boolean is an error.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_figment(Figment::new().merge(Env::prefixed("DIAGNOSTICS_")))
    }

    /// Extracts the config from any figment, over the defaults.
    pub fn from_figment(figment: Figment) -> Result<Self, Error> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(figment)
            .extract()?;
        Ok(config)
    }

    /// Enabled, with both credentials set.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Builds the diagnostics router, or `None` when the config is not active.
///
/// Routes, all behind [`ErrorMiddleware`] then [`BasicAuthMiddleware`]:
/// - `GET /debug/healthz` — liveness
/// - `GET /debug/readyz` — readiness
/// - `GET /debug/build` — crate name and version as JSON
pub fn router(config: &DiagnosticsConfig) -> Option<Router> {
    if !config.is_active() {
        return None;
    }

    info!("adding basic authentication to diagnostics routes");
    let router = Router::new()
        .with(ErrorMiddleware::new())
        .with(BasicAuthMiddleware::single(config.username.clone(), config.password.clone()));

    info!(prefix = ROUTE_PREFIX, "enabling diagnostics endpoints");
    Some(
        router
            .get(&format!("{ROUTE_PREFIX}/healthz"), health::liveness)
            .get(&format!("{ROUTE_PREFIX}/readyz"), health::readiness)
            .get(&format!("{ROUTE_PREFIX}/build"), build),
    )
}

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
}

fn build(w: &mut ResponseWriter, _req: Request) -> BoxFuture<'_> {
    Box::pin(async move {
        let body = serde_json::to_vec(&BuildInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        })?;
        w.set_content_type(ContentType::Json);
        w.write(&body);
        Ok(())
    })
}
