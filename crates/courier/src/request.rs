//! HTTP request types.

use std::str::FromStr;

use bytes::Bytes;
use http::HeaderMap;
use http::header::CONTENT_TYPE;

use crate::error::{Error, Result};

/// MIME type used for JSON bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP request methods supported by the builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET method.
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP DELETE method.
    Delete,
}

impl Method {
    /// The method name as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// A request body together with its declared MIME type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    /// Raw body bytes.
    pub bytes: Bytes,
    /// MIME type sent as `Content-Type`.
    pub mime_type: String,
}

/// An in-progress HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,
    /// The resolved target URL.
    pub url: String,
    /// Request headers. Names are case-insensitive.
    pub headers: HeaderMap,
    /// Optional request body.
    pub body: Option<Body>,
}

impl Request {
    /// Create a bodyless request.
    pub fn new(method: Method, url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            url: url.into(),
            headers,
            body: None,
        }
    }

    /// The declared `Content-Type`, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Parse the target URL, rejecting relative URLs.
    pub fn parsed_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.url).map_err(|err| Error::invalid_url(&self.url, err))
    }
}

/// Resolve `path` against an optional base URL.
///
/// With a base the path is appended so that exactly one `/` separates them.
/// Without a base the path is used as given and must be an absolute URL.
pub fn resolve_url(base: Option<&str>, path: &str) -> String {
    match base {
        Some(base) => {
            let base = base.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            if path.is_empty() {
                format!("{base}/")
            } else {
                format!("{base}/{path}")
            }
        }
        None => path.to_string(),
    }
}
