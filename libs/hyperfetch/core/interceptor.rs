//! Request and response interception
//!
//! Interceptors run inside the attempt loop, so a failing interceptor is an
//! ordinary attempt failure and goes through the retry policy like any
//! transport error.

use crate::core::request::{header_value, Attachment, Headers, Method, RequestBody};
use crate::error::{BoxError, RequestError, Result};
use crate::transport::{EncodedBody, FilePart, TransportResponse};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Request as seen by a [`RequestInterceptor`], before body encoding
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
    pub body: RequestBody,
    pub attachments: Vec<Attachment>,
}

impl OutgoingRequest {
    /// Encode the body for the wire
    ///
    /// Attachments take precedence: when present the request is multipart
    /// and a JSON object body becomes its text fields. Returns the encoded
    /// body with a content type unless the caller already set one.
    pub fn encode(&self) -> Result<EncodedBody> {
        let explicit_type = header_value(&self.headers, "content-type").is_some();
        let content_type = |default: &str| {
            if explicit_type {
                None
            } else {
                Some(default.to_string())
            }
        };

        if !self.attachments.is_empty() {
            let fields = match &self.body {
                RequestBody::Empty => Vec::new(),
                RequestBody::Json(Value::Object(map)) => map
                    .iter()
                    .map(|(key, value)| {
                        let text = match value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key.clone(), text)
                    })
                    .collect(),
                _ => {
                    return Err(RequestError::invalid_request(
                        "Attachments can only be combined with a JSON object body",
                    ))
                }
            };
            let files = self
                .attachments
                .iter()
                .map(|a| FilePart {
                    field: a.field.clone(),
                    file_name: a.file_name.clone(),
                    mime: a.mime.clone(),
                    bytes: a.bytes.clone(),
                })
                .collect();
            return Ok(EncodedBody::Multipart { fields, files });
        }

        Ok(match &self.body {
            RequestBody::Empty => EncodedBody::Empty,
            RequestBody::Json(value) => EncodedBody::Bytes {
                content_type: content_type("application/json"),
                bytes: serde_json::to_vec(value).map_err(|e| {
                    RequestError::invalid_request(format!("Failed to encode JSON body: {}", e))
                })?,
            },
            RequestBody::Text(text) => EncodedBody::Bytes {
                content_type: content_type("text/plain; charset=utf-8"),
                bytes: text.as_bytes().to_vec(),
            },
            RequestBody::Bytes(bytes) => EncodedBody::Bytes {
                content_type: content_type("application/octet-stream"),
                bytes: bytes.clone(),
            },
        })
    }
}

/// Rewrites or rejects a request before it is sent
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn on_request(&self, request: OutgoingRequest) -> std::result::Result<OutgoingRequest, BoxError>;
}

/// Inspects or rewrites a response before classification
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn on_response(
        &self,
        response: TransportResponse,
    ) -> std::result::Result<TransportResponse, BoxError>;
}

#[async_trait]
impl<F> RequestInterceptor for F
where
    F: Fn(OutgoingRequest) -> std::result::Result<OutgoingRequest, BoxError> + Send + Sync,
{
    async fn on_request(&self, request: OutgoingRequest) -> std::result::Result<OutgoingRequest, BoxError> {
        self(request)
    }
}

#[async_trait]
impl<F> ResponseInterceptor for F
where
    F: Fn(TransportResponse) -> std::result::Result<TransportResponse, BoxError> + Send + Sync,
{
    async fn on_response(
        &self,
        response: TransportResponse,
    ) -> std::result::Result<TransportResponse, BoxError> {
        self(response)
    }
}

/// Adds a bearer token to every request
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl RequestInterceptor for BearerAuth {
    async fn on_request(&self, mut request: OutgoingRequest) -> std::result::Result<OutgoingRequest, BoxError> {
        request
            .headers
            .insert("Authorization".to_string(), format!("Bearer {}", self.token));
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outgoing(body: RequestBody, attachments: Vec<Attachment>) -> OutgoingRequest {
        OutgoingRequest {
            method: Method::Post,
            url: Url::parse("http://api.local/upload").unwrap(),
            headers: Headers::new(),
            body,
            attachments,
        }
    }

    #[test]
    fn test_json_body_encoding() {
        let encoded = outgoing(RequestBody::Json(json!({"a": 1})), vec![])
            .encode()
            .unwrap();
        assert_eq!(
            encoded,
            EncodedBody::Bytes {
                content_type: Some("application/json".into()),
                bytes: br#"{"a":1}"#.to_vec(),
            }
        );
    }

    #[test]
    fn test_explicit_content_type_kept() {
        let mut request = outgoing(RequestBody::Text("x".into()), vec![]);
        request
            .headers
            .insert("Content-Type".into(), "text/csv".into());
        match request.encode().unwrap() {
            EncodedBody::Bytes { content_type, .. } => assert!(content_type.is_none()),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_attachments_take_precedence() {
        let request = outgoing(
            RequestBody::Json(json!({"title": "report", "pages": 3})),
            vec![Attachment::new("file", "r.pdf", vec![1, 2, 3]).with_mime("application/pdf")],
        );

        match request.encode().unwrap() {
            EncodedBody::Multipart { fields, files } => {
                assert!(fields.contains(&("title".to_string(), "report".to_string())));
                assert!(fields.contains(&("pages".to_string(), "3".to_string())));
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].file_name, "r.pdf");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_attachments_with_raw_body_rejected() {
        let request = outgoing(
            RequestBody::Bytes(vec![0]),
            vec![Attachment::new("file", "a.bin", vec![1])],
        );
        assert!(request.encode().is_err());
    }

    #[tokio::test]
    async fn test_closure_and_bearer_interceptors() {
        let request = outgoing(RequestBody::Empty, vec![]);

        let request = BearerAuth::new("t0k").on_request(request).await.unwrap();
        assert_eq!(header_value(&request.headers, "authorization"), Some("Bearer t0k"));

        let reject = |_: OutgoingRequest| -> std::result::Result<OutgoingRequest, BoxError> {
            Err("blocked".into())
        };
        assert!(reject.on_request(request).await.is_err());
    }
}
