//! Request execution pipeline

pub mod client;
pub mod config;
pub mod envelope;
pub mod interceptor;
pub mod parser;
pub mod request;

pub use client::HttpClient;
pub use config::{ClientConfig, CompletionCallback, ErrorCallback, ProgressCallback, ResolvedConfig};
pub use envelope::{ContentKind, DownloadSummary, Payload, RawResponse, ResponseEnvelope, ResponseMeta};
pub use interceptor::{BearerAuth, OutgoingRequest, RequestInterceptor, ResponseInterceptor};
pub use parser::{DefaultParser, JsonParser, ResponseParser};
pub use request::{Attachment, Headers, Method, Request, RequestBody, RequestBuilder, RequestOptions};
