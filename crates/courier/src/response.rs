//! Response metadata and normalized dispatch outcomes.

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;

use crate::error::Error;
use crate::request::APPLICATION_JSON;

/// Metadata of a received HTTP response.
///
/// The body is not part of the metadata; it travels in the [`Payload`] slot of
/// an [`Outcome`].
#[derive(Clone, Debug)]
pub struct Response {
    /// Final URL of the response (after redirects, if the transport follows them).
    pub url: String,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Human-readable reason phrase (e.g., `"OK"`, `"Not Found"`).
    ///
    /// May be `"Unknown"` for non-standard codes.
    pub status_text: String,

    /// Response headers as a case-insensitive map.
    pub headers: HeaderMap,
}

impl Response {
    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response is a client error (4xx status).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response is a server error (5xx status).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the Content-Type header value.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// The MIME essence of the Content-Type, lowercased and without
    /// parameters such as `charset`.
    pub fn mime_type(&self) -> Option<String> {
        self.content_type().map(mime_essence)
    }

    /// Whether the response declares an `application/json` body.
    pub fn is_json(&self) -> bool {
        self.mime_type().as_deref() == Some(APPLICATION_JSON)
    }
}

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// The body slot of an outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A decoded JSON value.
    Json(serde_json::Value),
    /// Raw body bytes, untouched.
    Raw(Bytes),
}

impl Payload {
    /// The decoded JSON value, if this payload holds one.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// The raw bytes, if this payload holds them.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Json(_) => None,
        }
    }

    /// Consume the payload into its JSON value.
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Consume the payload into its raw bytes.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Json(_) => None,
        }
    }
}

/// Everything a completion callback receives for one dispatch.
///
/// The three slots mirror what happened on the wire:
///
/// | situation                      | `response` | `payload`            | `error` |
/// |--------------------------------|------------|----------------------|---------|
/// | transport failure              | `None`     | partial raw, if any  | `Some`  |
/// | JSON decoded (`end`)           | `Some`     | `Json`               | `None`  |
/// | JSON decode failed (`end`)     | `Some`     | `None`               | `Some`  |
/// | not JSON (`end`)               | `Some`     | `None`               | `None`  |
/// | any response (`raw`)           | `Some`     | `Raw`                | `None`  |
#[derive(Clone, Debug)]
pub struct Outcome {
    /// Response metadata, absent when no response was obtained.
    pub response: Option<Response>,
    /// Decoded or raw body.
    pub payload: Option<Payload>,
    /// The failure, if any.
    pub error: Option<Error>,
}

impl Outcome {
    pub(crate) fn failed(error: Error, partial: Option<Bytes>) -> Self {
        Self {
            response: None,
            payload: partial.filter(|b| !b.is_empty()).map(Payload::Raw),
            error: Some(error),
        }
    }

    /// Whether the dispatch finished without an error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The HTTP status code, if a response was obtained.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// The decoded JSON value, if any.
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref().and_then(Payload::as_json)
    }

    /// The raw body bytes, if any.
    pub fn bytes(&self) -> Option<&Bytes> {
        self.payload.as_ref().and_then(Payload::as_bytes)
    }

    /// Split into the `(response, payload, error)` triple.
    pub fn into_parts(self) -> (Option<Response>, Option<Payload>, Option<Error>) {
        (self.response, self.payload, self.error)
    }
}
