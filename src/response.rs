//! The response sink handed to every handler.
//!
//! [`ResponseWriter`] buffers the response and tracks what has been written
//! so far. Later pipeline stages (the error renderer in particular) read that
//! state to decide whether it is still safe to write.
//!
//! | Tracked | Set by | Meaning |
//! |---|---|---|
//! | `status` | first [`write_header`](ResponseWriter::write_header), or the first [`write`](ResponseWriter::write) (implicit `200`) | the status line is committed |
//! | `written` | first non-empty [`write`](ResponseWriter::write) | a body byte was emitted, headers are frozen |
//! | `bytes_written` | every [`write`](ResponseWriter::write) | body length so far |

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_TYPE, IntoHeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;
use tracing::debug;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content types relay itself sets, for use with
/// [`ResponseWriter::set_content_type`]. Anything else goes through
/// [`ResponseWriter::set_header`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Json, // application/json
    Text, // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// Per-request response sink with write tracking.
///
/// ```rust
/// use http::StatusCode;
/// use relay::ResponseWriter;
///
/// let mut w = ResponseWriter::new();
/// w.write_header(StatusCode::CREATED);
/// w.write_header(StatusCode::BAD_GATEWAY); // ignored: first call wins
/// w.write(b"made it");
///
/// assert_eq!(w.status(), Some(StatusCode::CREATED));
/// assert!(w.written());
/// assert_eq!(w.bytes_written(), 7);
/// ```
#[derive(Debug, Default)]
pub struct ResponseWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    written: bool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commits the status line. Only the first call is honoured.
    pub fn write_header(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(current) => {
                debug!(%current, ignored = %status, "status already committed");
            }
        }
    }

    /// Appends `bytes` to the body, committing `200 OK` first if no status
    /// was set. Returns the number of bytes written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        if !bytes.is_empty() {
            self.written = true;
            self.body.extend_from_slice(bytes);
        }
        bytes.len()
    }

    /// The committed status, or `None` while unset.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Whether at least one body byte has been emitted.
    pub fn written(&self) -> bool {
        self.written
    }

    pub fn bytes_written(&self) -> usize {
        self.body.len()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header lookup. Returns `None` for absent or non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header, replacing any previous value.
    ///
    /// Ignored once the body has started: the headers went out with it.
    /// Returns whether the header was applied.
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> bool {
        if self.written {
            debug!("header change after body write ignored");
            return false;
        }
        self.headers.insert(name, value);
        true
    }

    pub fn set_content_type(&mut self, content_type: ContentType) -> bool {
        self.set_header(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()))
    }

    /// Finishes the exchange. A writer nobody touched becomes `200` with an
    /// empty body.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}
