//! The network transport the builder dispatches through.
//!
//! [`Transport`] is the seam between request building and the byte-level
//! exchange. The default implementation, [`ReqwestTransport`], wraps a shared
//! `reqwest::Client`; tests can plug in an in-memory implementation.
//!
//! # Configuration
//!
//! ```ignore
//! use std::time::Duration;
//! use courier::ReqwestTransport;
//!
//! let transport = ReqwestTransport::builder()
//!     .timeout(Duration::from_secs(30))
//!     .user_agent("MyApp/1.0")
//!     .build()?;
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;
use crate::targets;

/// A complete response as returned by a transport.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    /// Status line and headers.
    pub response: Response,
    /// The fully buffered body.
    pub body: Bytes,
}

/// A transport-level failure.
#[derive(Clone, Debug)]
pub struct TransportFailure {
    /// What went wrong.
    pub error: Error,
    /// Body bytes received before the failure, if any.
    pub partial_body: Option<Bytes>,
}

impl TransportFailure {
    /// A failure with no body data.
    pub fn new(error: Error) -> Self {
        Self {
            error,
            partial_body: None,
        }
    }

    /// A failure that happened after some body bytes arrived.
    pub fn with_partial_body(error: Error, partial_body: impl Into<Bytes>) -> Self {
        Self {
            error,
            partial_body: Some(partial_body.into()),
        }
    }
}

impl From<Error> for TransportFailure {
    fn from(error: Error) -> Self {
        Self::new(error)
    }
}

/// The result of one transport exchange.
pub type TransportResult = std::result::Result<TransportResponse, TransportFailure>;

/// Executes requests on the wire.
///
/// Implementations must be cheap to share: every builder holds an
/// `Arc<dyn Transport>` and calls [`execute`](Transport::execute) from its
/// dispatch queue.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Perform the exchange for `request`.
    fn execute(&self, request: Request) -> BoxFuture<'static, TransportResult>;
}

/// Configuration for the reqwest-backed transport.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Overall request deadline. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// User agent sent with every request.
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: Some(format!("Courier/{} (Rust)", env!("CARGO_PKG_VERSION"))),
        }
    }
}

/// Builder for a [`ReqwestTransport`] with custom configuration.
#[derive(Debug, Default)]
pub struct TransportBuilder {
    config: TransportConfig,
}

impl TransportBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable the connect timeout.
    pub fn no_connect_timeout(mut self) -> Self {
        self.config.connect_timeout = None;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<ReqwestTransport> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }

        let client = builder.build()?;

        Ok(ReqwestTransport {
            inner: Arc::new(ReqwestTransportInner {
                client,
                config: self.config,
            }),
        })
    }
}

struct ReqwestTransportInner {
    client: reqwest::Client,
    config: TransportConfig,
}

/// A transport backed by `reqwest`.
///
/// Cheaply cloneable; clones share the same client and connection pool.
#[derive(Clone)]
pub struct ReqwestTransport {
    inner: Arc<ReqwestTransportInner>,
}

impl ReqwestTransport {
    /// Create a builder for configuring a new transport.
    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(ReqwestTransportInner {
                client,
                config: TransportConfig::default(),
            }),
        }
    }

    /// Get the transport's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    async fn exchange(client: reqwest::Client, request: Request) -> TransportResult {
        let url = request.parsed_url()?;

        let mut req_builder = client
            .request(request.method.to_reqwest(), url)
            .headers(request.headers);
        if let Some(body) = request.body {
            req_builder = req_builder.body(body.bytes);
        }

        let mut res = req_builder
            .send()
            .await
            .map_err(|e| TransportFailure::new(e.into()))?;

        let status = res.status();
        let response = Response {
            url: res.url().to_string(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers: res.headers().clone(),
        };

        // Buffer chunk by chunk so a broken stream still yields what arrived.
        let mut buffer = Vec::new();
        loop {
            match res.chunk().await {
                Ok(Some(chunk)) => buffer.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(
                        target: targets::TRANSPORT,
                        received = buffer.len(),
                        "Response body interrupted: {}",
                        e
                    );
                    return Err(TransportFailure::with_partial_body(e.into(), buffer));
                }
            }
        }

        Ok(TransportResponse {
            response,
            body: Bytes::from(buffer),
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::builder().build().unwrap_or_else(|err| {
            tracing::error!(
                target: targets::TRANSPORT,
                "Failed to configure HTTP client, using reqwest defaults: {}",
                err
            );
            Self::from_client(reqwest::Client::new())
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: Request) -> BoxFuture<'static, TransportResult> {
        let client = self.inner.client.clone();
        Box::pin(Self::exchange(client, request))
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.inner.config)
            .finish()
    }
}

/// The process-wide default transport shared by builders that were not given
/// one explicitly.
pub fn default_transport() -> Arc<dyn Transport> {
    static DEFAULT: OnceLock<Arc<ReqwestTransport>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(ReqwestTransport::default())).clone()
}
