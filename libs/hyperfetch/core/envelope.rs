use crate::core::request::{header_value, Headers, Method};
use crate::error::RequestError;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;

/// Coarse classification of a response body, derived from its headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Text,
    Html,
    Binary,
    File,
    Unknown,
}

impl ContentKind {
    pub fn from_headers(headers: &Headers) -> Self {
        let disposition = header_value(headers, "content-disposition").unwrap_or_default();
        if disposition.to_ascii_lowercase().starts_with("attachment") {
            return ContentKind::File;
        }
        Self::from_content_type(header_value(headers, "content-type"))
    }

    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ContentKind::Unknown;
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            ContentKind::Json
        } else if mime == "text/html" || mime == "application/xhtml+xml" {
            ContentKind::Html
        } else if mime.starts_with("text/") || mime == "application/xml" || mime.ends_with("+xml") {
            ContentKind::Text
        } else if mime == "application/pdf"
            || mime == "application/zip"
            || mime == "application/gzip"
            || mime == "application/x-tar"
        {
            ContentKind::File
        } else if mime == "application/octet-stream"
            || mime.starts_with("image/")
            || mime.starts_with("audio/")
            || mime.starts_with("video/")
        {
            ContentKind::Binary
        } else {
            ContentKind::Unknown
        }
    }
}

/// Untyped decoded body, produced when no typed parser is supplied
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Fully-read response before parsing
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub content_kind: ContentKind,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Everything about a completed call except its payload
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: Option<u16>,
    pub headers: Headers,
    pub content_kind: ContentKind,
    /// Verdict of the active classifier
    pub success: bool,
    pub method: Method,
    pub url: String,
    pub duration: Duration,
    pub attempts: u32,
    pub from_cache: bool,
}

/// Uniform success-or-error result of a pipeline call
///
/// Exactly one of `payload` and `error` is populated.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope<T = Payload> {
    meta: ResponseMeta,
    payload: Option<T>,
    error: Option<RequestError>,
}

impl<T> ResponseEnvelope<T> {
    pub fn success(meta: ResponseMeta, payload: T) -> Self {
        Self {
            meta,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(mut meta: ResponseMeta, error: RequestError) -> Self {
        meta.success = false;
        Self {
            meta,
            payload: None,
            error: Some(error),
        }
    }

    pub fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    pub fn status(&self) -> Option<u16> {
        self.meta.status
    }

    pub fn is_success(&self) -> bool {
        self.meta.success
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn from_cache(&self) -> bool {
        self.meta.from_cache
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    pub fn into_result(self) -> Result<T, RequestError> {
        match (self.payload, self.error) {
            (_, Some(error)) => Err(error),
            (Some(payload), None) => Ok(payload),
            (None, None) => Err(RequestError::invalid_request("Envelope carries no payload")),
        }
    }
}

/// Result of a streaming download
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub path: PathBuf,
    pub status: u16,
    pub bytes_written: u64,
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_content_kind_detection() {
        assert_eq!(
            ContentKind::from_content_type(Some("application/json; charset=utf-8")),
            ContentKind::Json
        );
        assert_eq!(
            ContentKind::from_content_type(Some("application/problem+json")),
            ContentKind::Json
        );
        assert_eq!(ContentKind::from_content_type(Some("text/html")), ContentKind::Html);
        assert_eq!(ContentKind::from_content_type(Some("text/plain")), ContentKind::Text);
        assert_eq!(ContentKind::from_content_type(Some("image/png")), ContentKind::Binary);
        assert_eq!(ContentKind::from_content_type(Some("application/pdf")), ContentKind::File);
        assert_eq!(ContentKind::from_content_type(None), ContentKind::Unknown);

        let h = headers(&[
            ("Content-Type", "application/json"),
            ("Content-Disposition", "attachment; filename=\"a.json\""),
        ]);
        assert_eq!(ContentKind::from_headers(&h), ContentKind::File);
    }

    #[test]
    fn test_envelope_invariant() {
        let meta = ResponseMeta {
            status: Some(500),
            headers: Headers::new(),
            content_kind: ContentKind::Unknown,
            success: true,
            method: Method::Get,
            url: "http://localhost/".into(),
            duration: Duration::ZERO,
            attempts: 1,
            from_cache: false,
        };
        let envelope: ResponseEnvelope<Payload> = ResponseEnvelope::failure(
            meta,
            RequestError::invalid_request("bad"),
        );

        assert!(!envelope.is_success());
        assert!(envelope.payload().is_none());
        assert!(envelope.into_result().is_err());
    }
}
