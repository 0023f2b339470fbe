//! One-call constructors per HTTP verb.
//!
//! Each function is a thin composition of [`Agent`] primitives:
//!
//! - `post(url, options)` is `Agent::new(POST, url, headers)`
//! - `post_json(url, &body, options)` adds `.send(&body)`
//! - an `on_complete` callback in the options adds `.end(callback)`
//!
//! ```ignore
//! use courier::{RequestOptions, verbs};
//! use serde_json::json;
//!
//! let agent = verbs::post_json(
//!     "https://api.example.com/users",
//!     &json!({"name": "Ada"}),
//!     RequestOptions::new()
//!         .header("Authorization", "Bearer token")
//!         .on_complete(|response, payload, error| { /* ... */ }),
//! );
//! ```

use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use serde::Serialize;

use crate::agent::Agent;
use crate::error::Error;
use crate::request::Method;
use crate::response::{Payload, Response};

/// A completion callback receiving response metadata, payload and error.
pub type Completion =
    Box<dyn FnOnce(Option<Response>, Option<Payload>, Option<Error>) + Send + 'static>;

/// Optional parts of a one-call request.
#[derive(Default)]
pub struct RequestOptions {
    headers: Option<HeaderMap>,
    on_complete: Option<Completion>,
    error: Option<Error>,
}

impl RequestOptions {
    /// Options with no headers and no callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `headers` as the request's header map.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Add a single header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let parsed = HeaderName::from_bytes(name.as_ref().as_bytes())
            .map_err(Error::from)
            .and_then(|name| Ok((name, HeaderValue::from_str(value.as_ref())?)));
        match parsed {
            Ok((name, value)) => {
                self.headers
                    .get_or_insert_with(HeaderMap::new)
                    .insert(name, value);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Dispatch immediately and deliver the outcome to `callback`.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Option<Response>, Option<Payload>, Option<Error>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOptions")
            .field("headers", &self.headers)
            .field("has_on_complete", &self.on_complete.is_some())
            .field("error", &self.error)
            .finish()
    }
}

fn build(method: Method, url: impl Into<String>, options: &mut RequestOptions) -> Agent {
    let mut agent = Agent::new(method, url, options.headers.take());
    if let Some(error) = options.error.take() {
        agent.record(error);
    }
    agent
}

fn finish(agent: Agent, options: RequestOptions) -> Agent {
    match options.on_complete {
        Some(callback) => agent.end(callback),
        None => agent,
    }
}

fn bodyless(method: Method, url: impl Into<String>, mut options: RequestOptions) -> Agent {
    let agent = build(method, url, &mut options);
    finish(agent, options)
}

fn with_json<T: Serialize + ?Sized>(
    method: Method,
    url: impl Into<String>,
    body: &T,
    mut options: RequestOptions,
) -> Agent {
    let agent = build(method, url, &mut options).send(body);
    finish(agent, options)
}

/// Build a GET request, dispatching it if `options` carries a callback.
pub fn get(url: impl Into<String>, options: RequestOptions) -> Agent {
    bodyless(Method::Get, url, options)
}

/// Build a bodyless POST request.
pub fn post(url: impl Into<String>, options: RequestOptions) -> Agent {
    bodyless(Method::Post, url, options)
}

/// Build a POST request carrying `body` as JSON.
pub fn post_json<T: Serialize + ?Sized>(
    url: impl Into<String>,
    body: &T,
    options: RequestOptions,
) -> Agent {
    with_json(Method::Post, url, body, options)
}

/// Build a bodyless PUT request.
pub fn put(url: impl Into<String>, options: RequestOptions) -> Agent {
    bodyless(Method::Put, url, options)
}

/// Build a PUT request carrying `body` as JSON.
pub fn put_json<T: Serialize + ?Sized>(
    url: impl Into<String>,
    body: &T,
    options: RequestOptions,
) -> Agent {
    with_json(Method::Put, url, body, options)
}

/// Build a DELETE request.
pub fn delete(url: impl Into<String>, options: RequestOptions) -> Agent {
    bodyless(Method::Delete, url, options)
}
