//! Error types for request building and dispatch.

/// Errors surfaced through the error slot of a dispatch outcome.
///
/// Every variant carries owned strings so an error recorded on a builder can be
/// reported again by a later dispatch of the same builder.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The transport failed before a complete response was obtained.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connecting to the remote host failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport gave up waiting for the response.
    #[error("Request timed out")]
    Timeout,

    /// A request value could not be encoded as JSON.
    #[error("Failed to serialize request body: {0}")]
    Serialize(String),

    /// A response declared as JSON could not be decoded.
    #[error("Failed to deserialize response body: {0}")]
    Deserialize(String),

    /// The target URL is malformed or not absolute.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// A header name or value is not valid HTTP.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// An unsupported HTTP method name.
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// The dispatch queue dropped the job before it completed.
    #[error("Dispatch queue closed before the request completed")]
    QueueClosed,
}

impl Error {
    /// Create an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error happened on the wire rather than while building the
    /// request or decoding the response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Connection(_) | Self::Timeout
        )
    }

    /// Whether the error was recorded while building the request, before any
    /// network I/O.
    pub fn is_build(&self) -> bool {
        matches!(
            self,
            Self::Serialize(_)
                | Self::InvalidUrl { .. }
                | Self::InvalidHeader(_)
                | Self::InvalidMethod(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if let Some(url) = err.url().filter(|_| err.is_builder()) {
            Self::invalid_url(url.as_str(), &err)
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for courier operations.
pub type Result<T> = std::result::Result<T, Error>;
