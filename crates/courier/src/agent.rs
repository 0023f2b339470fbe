//! The fluent request builder.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::HeaderMap;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::codec::{JsonCodec, SerdeJsonCodec};
use crate::error::Error;
use crate::queue::{Dispatch, DispatchId, WorkQueue};
use crate::request::{APPLICATION_JSON, Body, Method, Request, resolve_url};
use crate::response::{Outcome, Payload, Response};
use crate::targets;
use crate::transport::{Transport, TransportResponse, default_transport};

/// How a dispatch treats the response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Decode declared JSON, deliver nothing otherwise.
    Json,
    /// Deliver the bytes untouched.
    Raw,
}

/// A fluent HTTP request builder.
///
/// An `Agent` owns one in-progress [`Request`] and a private dispatch queue.
/// Mutators take the builder by value and hand the same instance back, so
/// calls chain without copying. [`end`](Self::end) and [`raw`](Self::raw)
/// dispatch the request and also hand the builder back, which lets a builder
/// created with [`with_base`](Self::with_base) be re-targeted with
/// [`request`](Self::request) and dispatched again.
///
/// Errors found while building (an invalid header, a value that cannot be
/// encoded as JSON) never interrupt the chain. The first one is recorded and
/// delivered through the error slot of the next dispatch, which then skips the
/// network entirely.
///
/// # Example
///
/// ```ignore
/// use courier::Agent;
/// use serde_json::json;
///
/// Agent::post("https://api.example.com/users")
///     .set_header("Authorization", "Bearer token")
///     .send(&json!({"name": "Ada"}))
///     .end(|response, payload, error| {
///         if let Some(error) = error {
///             eprintln!("request failed: {error}");
///         }
///     });
/// ```
pub struct Agent {
    base_url: Option<String>,
    default_headers: HeaderMap,
    request: Request,
    error: Option<Error>,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn JsonCodec>,
    queue: WorkQueue,
}

impl Agent {
    /// Create a builder for `method` against an absolute `url`.
    ///
    /// `headers`, if given, replace the default (empty) header map. They are
    /// also re-applied by every later [`request`](Self::request) call.
    pub fn new(method: Method, url: impl Into<String>, headers: Option<HeaderMap>) -> Self {
        let default_headers = headers.unwrap_or_default();
        Self {
            base_url: None,
            request: Request::new(method, url, default_headers.clone()),
            default_headers,
            error: None,
            transport: default_transport(),
            codec: Arc::new(SerdeJsonCodec),
            queue: WorkQueue::new(),
        }
    }

    /// Create a builder that resolves relative paths against `base_url`.
    ///
    /// Until [`request`](Self::request) is called the builder targets the base
    /// URL itself with `GET`.
    pub fn with_base(base_url: impl Into<String>, headers: Option<HeaderMap>) -> Self {
        let base_url = base_url.into();
        let mut agent = Self::new(Method::Get, base_url.clone(), headers);
        agent.base_url = Some(base_url);
        agent
    }

    /// Create a GET request builder.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url, None)
    }

    /// Create a POST request builder.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url, None)
    }

    /// Create a PUT request builder.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url, None)
    }

    /// Create a DELETE request builder.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url, None)
    }

    /// Use a specific transport instead of the shared reqwest one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Use a specific JSON codec.
    pub fn codec(mut self, codec: Arc<dyn JsonCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Set a header, overwriting any previous value for the same name.
    ///
    /// Names are case-insensitive.
    pub fn set_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes());
        let value = HeaderValue::from_str(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                if name == CONTENT_TYPE {
                    if let (Some(body), Ok(mime)) = (self.request.body.as_mut(), value.to_str()) {
                        body.mime_type = mime.to_owned();
                    }
                }
                self.request.headers.insert(name, value);
            }
            (Err(e), _) => self.record(e.into()),
            (_, Err(e)) => self.record(e.into()),
        }
        self
    }

    /// Attach `bytes` as the body and declare `mime_type` as its `Content-Type`.
    ///
    /// Replaces any previous body.
    pub fn set_body(mut self, bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        match HeaderValue::from_str(&mime_type) {
            Ok(value) => {
                self.request.headers.insert(CONTENT_TYPE, value);
                self.request.body = Some(Body {
                    bytes: bytes.into(),
                    mime_type,
                });
            }
            Err(e) => self.record(e.into()),
        }
        self
    }

    /// Encode `value` as JSON and attach it as an `application/json` body.
    ///
    /// A value that cannot be encoded (for example a map with non-string
    /// keys) is reported by the next dispatch.
    pub fn send<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        let encoded = serde_json::to_value(value)
            .map_err(|e| Error::Serialize(e.to_string()))
            .and_then(|value| self.codec.encode(&value));
        match encoded {
            Ok(bytes) => self.set_body(bytes, APPLICATION_JSON),
            Err(e) => {
                self.record(e);
                self
            }
        }
    }

    /// Re-target the builder at `path` with `method`.
    ///
    /// `path` is appended to the base URL when the builder has one, and must
    /// be absolute otherwise. The request is rebuilt from the default headers;
    /// any body and any recorded error are discarded.
    pub fn request(mut self, method: Method, path: impl AsRef<str>) -> Self {
        let url = resolve_url(self.base_url.as_deref(), path.as_ref());
        self.request = Request::new(method, url, self.default_headers.clone());
        self.error = None;
        self
    }

    /// Dispatch the request and call `callback` once with the outcome.
    ///
    /// A response declared as `application/json` with a non-empty body is
    /// decoded and delivered as [`Payload::Json`]. Any other response delivers
    /// its metadata only; use [`raw`](Self::raw) to receive the bytes. On a
    /// transport failure the metadata is absent and whatever body data arrived
    /// is delivered as [`Payload::Raw`].
    ///
    /// The callback runs on a runtime worker, never before this call returns.
    pub fn end<F>(self, callback: F) -> Self
    where
        F: FnOnce(Option<Response>, Option<Payload>, Option<Error>) + Send + 'static,
    {
        let _gate = self.dispatch_with(Mode::Json, callback);
        self
    }

    /// Dispatch the request and call `callback` once with the raw body.
    ///
    /// No decoding is attempted, whatever the declared content type.
    pub fn raw<F>(self, callback: F) -> Self
    where
        F: FnOnce(Option<Response>, Option<Payload>, Option<Error>) + Send + 'static,
    {
        let _gate = self.dispatch_with(Mode::Raw, callback);
        self
    }

    /// Dispatch the request and return a handle resolving to the outcome of
    /// [`end`](Self::end).
    pub fn execute(&self) -> Dispatch {
        self.dispatch(Mode::Json)
    }

    /// Dispatch the request and return a handle resolving to the outcome of
    /// [`raw`](Self::raw).
    pub fn execute_raw(&self) -> Dispatch {
        self.dispatch(Mode::Raw)
    }

    /// The request as it would be dispatched now.
    pub fn request_ref(&self) -> &Request {
        &self.request
    }

    /// The current HTTP method.
    pub fn method(&self) -> Method {
        self.request.method
    }

    /// The resolved target URL.
    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// The current request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.request.headers
    }

    /// The current body, if any.
    pub fn body(&self) -> Option<&Body> {
        self.request.body.as_ref()
    }

    /// The base URL relative paths are resolved against.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// The error the next dispatch will report instead of sending, if any.
    pub fn pending_error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Record a build error. The first one wins.
    pub(crate) fn record(&mut self, error: Error) {
        tracing::warn!(
            target: targets::AGENT,
            method = %self.request.method,
            url = %self.request.url,
            "{}",
            error
        );
        self.error.get_or_insert(error);
    }

    fn dispatch(&self, mode: Mode) -> Dispatch {
        let id = DispatchId::next();
        let (tx, rx) = oneshot::channel();
        let work = self.work(id, mode);
        self.queue.submit(async move {
            let _ = tx.send(work.await);
        });
        Dispatch::new(id, rx)
    }

    /// Queue a dispatch whose outcome goes to `callback`.
    ///
    /// The job waits until the returned sender is dropped, which the caller
    /// does on return.
    fn dispatch_with<F>(&self, mode: Mode, callback: F) -> oneshot::Sender<()>
    where
        F: FnOnce(Option<Response>, Option<Payload>, Option<Error>) + Send + 'static,
    {
        let id = DispatchId::next();
        let (gate, opened) = oneshot::channel::<()>();
        let work = self.work(id, mode);
        self.queue.submit(async move {
            let _ = opened.await;
            let (response, payload, error) = work.await.into_parts();
            callback(response, payload, error);
        });
        gate
    }

    /// Snapshot the request and build the job that performs it.
    fn work(&self, id: DispatchId, mode: Mode) -> BoxFuture<'static, Outcome> {
        let request = self.request.clone();
        let error = self.error.clone();
        let transport = self.transport.clone();
        let codec = self.codec.clone();

        Box::pin(async move {
            let method = request.method;
            let url = request.url.clone();

            if let Some(error) = error {
                tracing::debug!(target: targets::AGENT, %id, %method, %url, "Not sent: {}", error);
                return Outcome::failed(error, None);
            }

            tracing::debug!(target: targets::AGENT, %id, %method, %url, "Dispatching");
            match transport.execute(request).await {
                Ok(exchange) => {
                    tracing::debug!(
                        target: targets::AGENT,
                        %id,
                        %method,
                        %url,
                        status = exchange.response.status,
                        bytes = exchange.body.len(),
                        "Completed"
                    );
                    match mode {
                        Mode::Json => normalize_json(exchange, codec.as_ref()),
                        Mode::Raw => Outcome {
                            response: Some(exchange.response),
                            payload: Some(Payload::Raw(exchange.body)),
                            error: None,
                        },
                    }
                }
                Err(failure) => {
                    tracing::warn!(target: targets::AGENT, %id, %method, %url, "Failed: {}", failure.error);
                    Outcome::failed(failure.error, failure.partial_body)
                }
            }
        })
    }
}

/// Turn a completed exchange into the outcome `end` delivers.
fn normalize_json(exchange: TransportResponse, codec: &dyn JsonCodec) -> Outcome {
    let TransportResponse { response, body } = exchange;

    if !response.is_json() || body.is_empty() {
        return Outcome {
            response: Some(response),
            payload: None,
            error: None,
        };
    }

    match codec.decode(&body) {
        Ok(value) => Outcome {
            response: Some(response),
            payload: Some(Payload::Json(value)),
            error: None,
        },
        Err(error) => Outcome {
            response: Some(response),
            payload: None,
            error: Some(error),
        },
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("method", &self.request.method)
            .field("url", &self.request.url)
            .field("base_url", &self.base_url)
            .field("has_body", &self.request.body.is_some())
            .field("pending_error", &self.error)
            .field("queue", &self.queue)
            .finish()
    }
}
