//! Alerting collaborator.
//!
//! The error layer reports every failure it renders to an [`AlertSink`] at
//! a [`Severity`] derived from the final status. Delivery is the sink's
//! business: relay never waits on it beyond the call and never lets a sink
//! failure reach the client.

use std::fmt;

use http::{Method, StatusCode};
use tracing::{error, warn};

use crate::failure::{BoxError, Failure};

/// Alert severity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// `5xx` → `Error`, `4xx` → `Warning`, anything else → no alert.
    pub fn for_status(status: StatusCode) -> Option<Self> {
        if status.is_server_error() {
            Some(Self::Error)
        } else if status.is_client_error() {
            Some(Self::Warning)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warning  => "warning",
            Self::Error    => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an alert knows about the request that failed.
///
/// The request itself is owned by the handler chain by the time an alert
/// fires, so the error layer keeps this copy.
#[derive(Clone, Debug)]
pub struct RequestSummary {
    pub method: Method,
    pub path: String,
    pub request_id: Option<String>,
    pub status: StatusCode,
}

/// Receives `(severity, request, failure)` triples.
pub trait AlertSink: Send + Sync + 'static {
    fn alert(&self, severity: Severity, request: &RequestSummary, failure: &Failure) -> Result<(), BoxError>;
}

/// Default sink: a `tracing` event on the `alerts` target.
///
/// Route that target to your paging system with a subscriber layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAlerts;

impl AlertSink for LogAlerts {
    fn alert(&self, severity: Severity, request: &RequestSummary, failure: &Failure) -> Result<(), BoxError> {
        let request_id = request.request_id.as_deref().unwrap_or("");
        match severity {
            Severity::Warning => warn!(
                target: "alerts",
                %severity,
                method = %request.method,
                path = %request.path,
                status = request.status.as_u16(),
                request_id,
                error = %failure,
                "request failed",
            ),
            Severity::Error | Severity::Critical => error!(
                target: "alerts",
                %severity,
                method = %request.method,
                path = %request.path,
                status = request.status.as_u16(),
                request_id,
                error = %failure,
                "request failed",
            ),
        }
        Ok(())
    }
}
