//! Transport collaborator
//!
//! The pipeline never talks to the network directly. It hands a fully
//! resolved [`TransportRequest`] to a [`Transport`] and gets back a status,
//! headers and a body stream it reads incrementally.

pub mod http;

pub use http::ReqwestTransport;

use crate::core::config::ProgressCallback;
use crate::core::request::{Headers, Method};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Response body delivered chunk by chunk
pub type BodyStream = BoxStream<'static, Result<Vec<u8>>>;

/// File part of a multipart body
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Body after wire encoding
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EncodedBody {
    #[default]
    Empty,
    Bytes {
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

impl EncodedBody {
    /// Size in bytes when known up front
    pub fn len(&self) -> Option<u64> {
        match self {
            EncodedBody::Empty => Some(0),
            EncodedBody::Bytes { bytes, .. } => Some(bytes.len() as u64),
            EncodedBody::Multipart { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, EncodedBody::Empty)
    }
}

/// One attempt's worth of request, fully resolved
#[derive(Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: EncodedBody,
    pub timeout: Option<Duration>,
    pub upload_progress: Option<ProgressCallback>,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Status line, headers and the unread body
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub content_length: Option<u64>,
    pub body: BodyStream,
}

impl TransportResponse {
    /// Response with an in-memory body delivered as a single chunk
    pub fn from_bytes(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        let content_length = Some(body.len() as u64);
        Self {
            status,
            headers,
            content_length,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    /// Drain the body, reporting progress after every chunk
    pub async fn read_body(self, progress: Option<&ProgressCallback>) -> Result<Vec<u8>> {
        let total = self.content_length;
        let mut body = self.body;
        let mut buffer = Vec::with_capacity(total.unwrap_or(0).min(1 << 20) as usize);

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(&chunk);
            if let Some(progress) = progress {
                progress(buffer.len() as u64, total);
            }
        }

        Ok(buffer)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens one request and returns the response head plus body stream
///
/// Implementations report connection failures as `ErrorKind::Network` and
/// expired deadlines as `ErrorKind::Timeout`. Non-success statuses are not
/// errors at this layer; classification happens in the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}
