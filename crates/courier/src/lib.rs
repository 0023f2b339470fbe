//! Fluent HTTP request builder.
//!
//! Courier builds a single HTTP request (method, URL, headers, body),
//! dispatches it asynchronously on a queue owned by the builder, and
//! normalizes the response into one callback invocation:
//!
//! ```ignore
//! use courier::Agent;
//!
//! Agent::get("https://api.example.com/users")
//!     .set_header("Accept", "application/json")
//!     .end(|response, payload, error| {
//!         // `payload` holds the decoded JSON when the response declared
//!         // `application/json`.
//!     });
//! ```
//!
//! ## Builders
//!
//! - [`Agent::new`] / [`Agent::get`], [`Agent::post`], [`Agent::put`],
//!   [`Agent::delete`] - target an absolute URL
//! - [`Agent::with_base`] + [`Agent::request`] - resolve relative paths
//!   against a base URL and reuse the builder for several calls
//! - [`verbs`] - one-call constructors taking [`RequestOptions`]
//!
//! ## Bodies
//!
//! ```ignore
//! // JSON, sets `Content-Type: application/json`
//! Agent::post(url).send(&serde_json::json!({"name": "John"}));
//!
//! // Anything else
//! Agent::put(url).set_body(png_bytes, "image/png");
//! ```
//!
//! ## Terminal operations
//!
//! - [`Agent::end`] - decodes declared JSON bodies; other bodies are not
//!   delivered
//! - [`Agent::raw`] - always delivers the body bytes untouched
//! - [`Agent::execute`] / [`Agent::execute_raw`] - the same, as an awaitable
//!   [`Dispatch`]
//!
//! Failures never panic and never interrupt a chain. They arrive in the error
//! slot of the outcome, exactly once per dispatch. A callback that panics is
//! logged and does not affect the dispatches queued behind it.
//!
//! The exactly-once guarantee holds while the runtime the builder's worker
//! started on is alive. Dispatches still queued when a short-lived runtime
//! shuts down are dropped without a callback; see [`runtime`].
//!
//! ## Logging
//!
//! The crate logs through `tracing` under the [`targets`] below and installs no
//! subscriber of its own.

mod agent;
mod codec;
mod error;
mod queue;
mod request;
mod response;
mod transport;
pub mod verbs;

pub use agent::Agent;
pub use codec::{JsonCodec, SerdeJsonCodec};
pub use error::{Error, Result};
pub use queue::{Dispatch, DispatchId, runtime};
pub use request::{APPLICATION_JSON, Body, Method, Request, resolve_url};
pub use response::{Outcome, Payload, Response};
pub use transport::{
    ReqwestTransport, Transport, TransportBuilder, TransportConfig, TransportFailure,
    TransportResponse, TransportResult, default_transport,
};
pub use verbs::{Completion, RequestOptions};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Request building and dispatch.
    pub const AGENT: &str = "courier::agent";
    /// Wire exchanges.
    pub const TRANSPORT: &str = "courier::transport";
    /// Dispatch queue lifecycle.
    pub const QUEUE: &str = "courier::queue";
}
