//! Failure classification and error-body rendering.
//!
//! [`classify`] is pure: it maps a failure plus the two negotiation inputs
//! to a [`Classified`] status, encoding and body. [`render`] applies that
//! result to a [`ResponseWriter`] without clobbering anything the handler
//! already committed.
//!
//! # Negotiation precedence
//!
//! 1. A `Content-Type` the handler already set on the response. JSON if its
//!    essence is `application/json` or it carries a `+json` suffix, plain
//!    text otherwise.
//! 2. The request's `Accept` header, when the response has no
//!    `Content-Type`. JSON if any acceptable media range is JSON.
//! 3. `text/plain`.

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;

use crate::failure::{FieldErrors, Failure};
use crate::response::{ContentType, ResponseWriter};

/// Body encoding picked by negotiation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    Json,
    Text,
}

/// A failure resolved to what should go on the wire.
#[derive(Clone, Debug)]
pub struct Classified {
    pub status: StatusCode,
    pub encoding: Encoding,
    pub body: Bytes,
}

/// Maps a failure to its status code, unwrapping any context layers.
pub fn status_for(failure: &Failure) -> StatusCode {
    match failure {
        Failure::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Failure::BadRequest(_) => StatusCode::BAD_REQUEST,
        Failure::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Failure::Panic(_) | Failure::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Failure::Context { source, .. } => status_for(source),
    }
}

/// Whether a media type (`Content-Type` value or `Accept` range) is JSON.
pub fn is_json(media_type: &str) -> bool {
    match media_type.trim().parse::<mime::Mime>() {
        Ok(m) => m.essence_str() == "application/json" || m.suffix() == Some(mime::JSON),
        Err(_) => false,
    }
}

/// Whether any media range of an `Accept` header with non-zero quality is JSON.
pub fn accepts_json(accept: &str) -> bool {
    accept.split(',').any(|range| {
        let Ok(m) = range.trim().parse::<mime::Mime>() else {
            return false;
        };
        let refused = m
            .get_param("q")
            .and_then(|q| q.as_str().parse::<f32>().ok())
            .is_some_and(|q| q <= 0.0);
        !refused && is_json(m.essence_str())
    })
}

/// Picks the body encoding. See the module docs for the precedence.
pub fn negotiate(content_type: Option<&str>, accept: Option<&str>) -> Encoding {
    let json = match content_type {
        Some(ct) => is_json(ct),
        None => accept.is_some_and(accepts_json),
    };
    if json { Encoding::Json } else { Encoding::Text }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct FieldErrorsBody<'a> {
    errors: &'a FieldErrors,
}

/// Computes status, encoding and body for `failure`.
pub fn classify(failure: &Failure, content_type: Option<&str>, accept: Option<&str>) -> Classified {
    let status = status_for(failure);
    let encoding = negotiate(content_type, accept);
    let body = match encoding {
        Encoding::Json => json_body(failure),
        Encoding::Text => Bytes::from(format!("{failure}\n")),
    };
    Classified { status, encoding, body }
}

fn json_body(failure: &Failure) -> Bytes {
    let encoded = match failure.root() {
        Failure::Validation(errors) | Failure::BadRequest(errors) => {
            serde_json::to_vec(&FieldErrorsBody { errors })
        }
        _ => serde_json::to_vec(&ErrorBody { error: failure.to_string() }),
    };
    // Maps of strings always serialise; fall back to a fixed body regardless.
    let mut body = encoded.unwrap_or_else(|_| br#"{"error":"internal error"}"#.to_vec());
    body.push(b'\n');
    Bytes::from(body)
}

/// Writes the error response for `failure` into `w`, at most once.
///
/// - Body already written by the handler: nothing is added, the status is
///   made to exist (`500` if somehow unset).
/// - Status already set by the handler: kept, only the body is added.
/// - Otherwise: the derived status and a negotiated body.
///
/// Returns the final status.
pub fn render(w: &mut ResponseWriter, accept: Option<&str>, failure: &Failure) -> StatusCode {
    if w.written() {
        w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        return w.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let classified = classify(failure, w.header(CONTENT_TYPE.as_str()), accept);

    if w.headers().get(CONTENT_TYPE).is_none() {
        match classified.encoding {
            Encoding::Json => w.set_content_type(ContentType::Json),
            Encoding::Text => w.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain")),
        };
    }
    w.write_header(classified.status);
    w.write(&classified.body);

    w.status().unwrap_or(classified.status)
}
