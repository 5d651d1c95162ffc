use crate::cache::CachePolicy;
use crate::core::config::{CompletionCallback, ErrorCallback, ProgressCallback};
use crate::core::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::core::envelope::ResponseMeta;
use crate::error::RequestError;
use crate::policy::{RetryPolicy, StatusClassifier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP headers as name -> value pairs
pub type Headers = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Methods whose responses are cached without an explicit per-call request
    pub fn is_read_only(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload before wire encoding
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }
}

/// File attached to a multipart request
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl Attachment {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Per-call overrides of the client configuration
///
/// Every field left as `None` falls back to the client-level value.
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub base_url: Option<String>,
    /// Replaces the client's default headers for this call
    pub default_headers: Option<Headers>,
    pub timeout: Option<Duration>,
    pub debug: Option<bool>,
    pub cache: Option<CachePolicy>,
    pub retry: Option<RetryPolicy>,
    pub classifier: Option<StatusClassifier>,
    pub on_error: Option<ErrorCallback>,
    pub on_complete: Option<CompletionCallback>,
    pub request_interceptor: Option<Arc<dyn RequestInterceptor>>,
    pub response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
    pub on_upload_progress: Option<ProgressCallback>,
    pub on_download_progress: Option<ProgressCallback>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("classifier", &self.classifier.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

/// Immutable description of one logical call
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Headers,
    pub(crate) body: RequestBody,
    pub(crate) attachments: Vec<Attachment>,
    pub(crate) options: RequestOptions,
}

impl Request {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                method,
                path: path.into(),
                query: Vec::new(),
                headers: Headers::new(),
                body: RequestBody::Empty,
                attachments: Vec::new(),
                options: RequestOptions::default(),
            },
        }
    }

    pub fn get(path: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> RequestBuilder {
        Self::builder(Method::Delete, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }
}

/// Builder for [`Request`]
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.request.body = RequestBody::Json(value);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.request.body = RequestBody::Text(text.into());
        self
    }

    pub fn bytes(mut self, bytes: Vec<u8>) -> Self {
        self.request.body = RequestBody::Bytes(bytes);
        self
    }

    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.request.attachments.push(attachment);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.request.options.base_url = Some(base_url.into());
        self
    }

    /// Use `headers` instead of the client defaults; `header()` entries
    /// still win over them
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.request.options.default_headers = Some(headers);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.options.timeout = Some(timeout);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.request.options.debug = Some(debug);
        self
    }

    /// Cache this call's response (also enables caching for non-GET methods)
    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.request.options.cache = Some(policy);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.request.options.retry = Some(policy);
        self
    }

    pub fn classifier(mut self, classifier: StatusClassifier) -> Self {
        self.request.options.classifier = Some(classifier);
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.request.options.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ResponseMeta, Option<&RequestError>) + Send + Sync + 'static,
    {
        self.request.options.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request.options.request_interceptor = Some(interceptor);
        self
    }

    pub fn response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.request.options.response_interceptor = Some(interceptor);
        self
    }

    pub fn on_upload_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.request.options.on_upload_progress = Some(Arc::new(callback));
        self
    }

    pub fn on_download_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.request.options.on_download_progress = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

impl From<RequestBuilder> for Request {
    fn from(builder: RequestBuilder) -> Self {
        builder.build()
    }
}

/// Merge two header maps; names compare case-insensitively and `overrides` win
pub fn merge_headers(base: &Headers, overrides: &Headers) -> Headers {
    let mut merged: Headers = base
        .iter()
        .filter(|(name, _)| {
            !overrides
                .keys()
                .any(|other| other.eq_ignore_ascii_case(name.as_str()))
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    merged.extend(overrides.iter().map(|(n, v)| (n.clone(), v.clone())));
    merged
}

/// Case-insensitive header lookup
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_parts() {
        let request = Request::post("/posts")
            .query("draft", "true")
            .header("X-Trace", "abc")
            .json(json!({"title": "hello"}))
            .timeout(Duration::from_secs(5))
            .build();

        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.path(), "/posts");
        assert_eq!(request.query(), &[("draft".to_string(), "true".to_string())]);
        assert_eq!(header_value(request.headers(), "x-trace"), Some("abc"));
        assert_eq!(request.body(), &RequestBody::Json(json!({"title": "hello"})));
        assert_eq!(request.options().timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_merge_headers_override_wins() {
        let mut base = Headers::new();
        base.insert("Accept".into(), "application/json".into());
        base.insert("X-Client".into(), "hyperfetch".into());

        let mut overrides = Headers::new();
        overrides.insert("accept".into(), "text/plain".into());

        let merged = merge_headers(&base, &overrides);
        assert_eq!(merged.len(), 2);
        assert_eq!(header_value(&merged, "Accept"), Some("text/plain"));
        assert_eq!(header_value(&merged, "x-client"), Some("hyperfetch"));
    }

    #[test]
    fn test_only_get_is_read_only() {
        assert!(Method::Get.is_read_only());
        assert!(!Method::Post.is_read_only());
        assert!(!Method::Delete.is_read_only());
        assert_eq!(Method::Patch.to_string(), "PATCH");
    }
}
