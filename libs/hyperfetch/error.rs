use crate::core::request::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by user-supplied hooks (interceptors, parsers, subscribers)
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cause category of a failed request
///
/// This is what retry policies match against when deciding whether a
/// failure is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received (connection refused, reset, DNS failure)
    Network,
    /// The transport call or body read did not finish in time
    Timeout,
    /// Status is in the classifier's client-error set
    ClientError,
    /// Client error with status 429
    RateLimited,
    /// Status is in the classifier's server-error set
    ServerError,
    /// Status is in the classifier's generic error set
    HttpStatus,
    /// Body could not be decoded into the requested shape
    Parse,
    /// A request or response interceptor failed
    Interceptor,
    /// The client was disposed
    Disposed,
    /// Local I/O failed (downloads)
    Io,
    /// The request could not be built (bad URL, conflicting body)
    InvalidRequest,
}

/// Structured error produced by the request pipeline
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RequestError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    method: Option<Method>,
    url: Option<String>,
    created_at: DateTime<Utc>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl RequestError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            method: None,
            url: None,
            created_at: Utc::now(),
            source: None,
        }
    }

    pub fn network(source: impl Into<BoxError>) -> Self {
        let source: BoxError = source.into();
        Self::new(ErrorKind::Network, format!("Network error: {}", source)).with_source(source)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Request timed out after {:?}", after),
        )
    }

    pub fn interceptor(source: BoxError) -> Self {
        Self::new(
            ErrorKind::Interceptor,
            format!("Interceptor failed: {}", source),
        )
        .with_source(source)
    }

    pub fn parse(source: BoxError) -> Self {
        Self::new(ErrorKind::Parse, format!("Failed to parse response: {}", source))
            .with_source(source)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn disposed() -> Self {
        Self::new(ErrorKind::Disposed, "Client has been disposed")
    }

    pub fn io(source: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("I/O error: {}", source)).with_source(source)
    }

    /// Build an HTTP status error
    ///
    /// `kind` comes from the active status classifier, so the same numeric
    /// code may be a client error for one service and a generic error for
    /// another.
    pub fn status(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("HTTP {}", status)
        } else {
            message
        };
        let mut error = Self::new(kind, message);
        error.status = Some(status);
        error
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        let source: BoxError = source.into();
        self.source = Some(Arc::from(source));
        self
    }

    /// Attach the originating method and URL
    pub fn with_context(mut self, method: Method, url: impl Into<String>) -> Self {
        self.method = Some(method);
        self.url = Some(url.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.kind, ErrorKind::ClientError | ErrorKind::RateLimited)
    }

    pub fn is_server_error(&self) -> bool {
        self.kind == ErrorKind::ServerError
    }

    pub fn is_network_error(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited || self.status == Some(429)
    }

    pub fn is_disposed(&self) -> bool {
        self.kind == ErrorKind::Disposed
    }

    /// Transient failures that usually succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        self.is_network_error() || self.is_timeout() || self.is_server_error() || self.is_rate_limited()
    }
}

/// Result type for hyperfetch operations
pub type Result<T> = std::result::Result<T, RequestError>;
