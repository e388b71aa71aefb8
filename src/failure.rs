//! Request failures returned by handlers.
//!
//! A handler that cannot finish its work returns a [`Failure`]. The variant
//! decides the status code, the payload decides the body. Wrapping with
//! [`Failure::context`] adds a message prefix without hiding the kind
//! underneath, so a wrapped validation failure still renders as `422`.
//!
//! ```rust
//! use relay::{FieldErrors, Failure};
//!
//! let err = Failure::Validation(
//!     FieldErrors::new().with("per_page", "must be greater than 0"),
//! )
//! .context("listing users");
//!
//! assert!(matches!(err.root(), Failure::Validation(_)));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Boxed, thread-safe error used for failures relay does not classify.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The closed set of failures a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// Client input failed semantic checks. Rendered as `422`.
    #[error("{0}")]
    Validation(FieldErrors),

    /// The request itself is malformed (e.g. unparsable query parameters).
    /// Same payload shape as [`Failure::Validation`], rendered as `400`.
    #[error("{0}")]
    BadRequest(FieldErrors),

    /// A credential or freshness check failed. Rendered as `401`.
    #[error("{0}")]
    Unauthorized(String),

    /// A panic caught by [`ErrorMiddleware`](crate::middleware::ErrorMiddleware).
    #[error("{0}")]
    Panic(String),

    /// Another failure with a message prefix.
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: Box<Failure>,
    },

    /// Anything else. Rendered as `500`.
    #[error(transparent)]
    Other(BoxError),
}

impl Failure {
    /// An unclassified failure carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Other(message.into())
    }

    /// An unclassified failure wrapping any error type.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Wraps `self` with a message prefix. Displays as `"<message>: <self>"`.
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context { message: message.into(), source: Box::new(self) }
    }

    /// The innermost failure under any number of [`Failure::Context`] layers.
    pub fn root(&self) -> &Failure {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

impl From<serde_json::Error> for Failure {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

/// Adds a message prefix to the failure of a `Result`.
pub trait Context<T> {
    fn context(self, message: impl Into<String>) -> Result<T, Failure>;
}

impl<T, E: Into<Failure>> Context<T> for Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T, Failure> {
        self.map_err(|e| Into::<Failure>::into(e).context(message))
    }
}

// ── FieldErrors ───────────────────────────────────────────────────────────────

/// Violations keyed by field name, each with its human-readable messages.
///
/// Serialises as the bare map, `{"per_page": ["must be greater than 0"]}`.
/// Fields are kept sorted so rendered bodies are stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one violation for `field`.
    pub fn add(&mut self, field: impl Into<String>, violation: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(violation.into());
    }

    /// Builder form of [`FieldErrors::add`].
    pub fn with(mut self, field: impl Into<String>, violation: impl Into<String>) -> Self {
        self.add(field, violation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// `per_page=must be greater than 0; name=is required, is too short`
impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, violations)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}={}", violations.join(", "))?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, violation) in iter {
            errors.add(field, violation);
        }
        errors
    }
}
