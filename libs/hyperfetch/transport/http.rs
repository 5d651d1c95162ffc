use super::{EncodedBody, Transport, TransportRequest, TransportResponse};
use crate::core::request::{Headers, Method};
use crate::error::{RequestError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use std::time::Duration;
use tracing::debug;

/// Upload chunk size when progress reporting is requested
const UPLOAD_CHUNK: usize = 16 * 1024;

/// [`Transport`] backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RequestError::invalid_request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn map_error(error: reqwest::Error, timeout: Option<Duration>) -> RequestError {
        if error.is_timeout() {
            RequestError::timeout(timeout.unwrap_or_default()).with_source(error)
        } else if error.is_builder() {
            RequestError::invalid_request(error.to_string()).with_source(error)
        } else {
            RequestError::network(error)
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn multipart_form(fields: Vec<(String, String)>, files: Vec<super::FilePart>) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in fields {
        form = form.text(name, value);
    }
    for file in files {
        let mut part = Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(mime) = file.mime {
            part = part
                .mime_str(&mime)
                .map_err(|e| RequestError::invalid_request(format!("Invalid MIME type {}: {}", mime, e)))?;
        }
        form = form.part(file.field, part);
    }
    Ok(form)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            timeout,
            upload_progress,
        } = request;

        let mut builder = self.client.request(to_reqwest_method(method), url);
        builder = headers
            .into_iter()
            .fold(builder, |b, (name, value)| b.header(name, value));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let mut multipart_size = None;
        builder = match body {
            EncodedBody::Empty => builder,
            EncodedBody::Bytes {
                content_type,
                bytes,
            } => {
                if let Some(content_type) = content_type {
                    builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
                }
                match upload_progress.clone() {
                    Some(progress) => {
                        let total = bytes.len() as u64;
                        let chunks: Vec<Vec<u8>> =
                            bytes.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
                        let mut sent = 0u64;
                        let body_stream = stream::iter(chunks).map(move |chunk| {
                            sent += chunk.len() as u64;
                            progress(sent, Some(total));
                            Ok::<_, std::io::Error>(chunk)
                        });
                        builder
                            .header(reqwest::header::CONTENT_LENGTH, total)
                            .body(Body::wrap_stream(body_stream))
                    }
                    None => builder.body(bytes),
                }
            }
            EncodedBody::Multipart { fields, files } => {
                multipart_size = Some(
                    files.iter().map(|f| f.bytes.len() as u64).sum::<u64>()
                        + fields.iter().map(|(_, v)| v.len() as u64).sum::<u64>(),
                );
                builder.multipart(multipart_form(fields, files)?)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_error(e, timeout))?;

        // Multipart bodies are encoded by reqwest; report them once sent
        if let (Some(size), Some(progress)) = (multipart_size, upload_progress.as_ref()) {
            progress(size, Some(size));
        }

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let mut response_headers = Headers::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                response_headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        debug!("Transport received {} ({:?} bytes)", status, content_length);

        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| ReqwestTransport::map_error(e, timeout))
            })
            .boxed();

        Ok(TransportResponse {
            status,
            headers: response_headers,
            content_length,
            body,
        })
    }
}
