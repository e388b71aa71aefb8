//! Infrastructure error type.

/// The error type returned by relay's fallible setup and serving operations.
///
/// Request-level failures (validation, auth, handler bugs) are expressed as
/// [`Failure`](crate::Failure) values and rendered into responses. This type
/// surfaces infrastructure problems: an unparsable bind address, a failed
/// `bind`, or invalid configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("config: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}
