use crate::cache::CachePolicy;
use crate::core::envelope::ResponseMeta;
use crate::core::interceptor::{RequestInterceptor, ResponseInterceptor};
use crate::core::request::{Headers, Method, RequestOptions};
use crate::error::{RequestError, Result};
use crate::policy::{RetryPolicy, StatusClassifier};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Called once with the final error of a failed call
pub type ErrorCallback = Arc<dyn Fn(&RequestError) + Send + Sync>;

/// Called once per call, after any error callback, with the outcome
pub type CompletionCallback = Arc<dyn Fn(&ResponseMeta, Option<&RequestError>) + Send + Sync>;

/// `(bytes_so_far, total_if_known)`
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Client-wide defaults
///
/// Built once and shared by every call. Per-call [`RequestOptions`] never
/// mutate it; [`ClientConfig::resolve`] produces a fresh [`ResolvedConfig`].
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub default_headers: Headers,
    pub timeout: Option<Duration>,
    pub debug: bool,
    pub on_error: Option<ErrorCallback>,
    pub on_complete: Option<CompletionCallback>,
    pub request_interceptor: Option<Arc<dyn RequestInterceptor>>,
    pub response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
    pub cache: CachePolicy,
    pub retry: RetryPolicy,
    pub classifier: StatusClassifier,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: Headers::new(),
            timeout: Some(Duration::from_secs(30)),
            debug: false,
            on_error: None,
            on_complete: None,
            request_interceptor: None,
            response_interceptor: None,
            cache: CachePolicy::default(),
            retry: RetryPolicy::none(),
            classifier: StatusClassifier::default(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("default_headers", &self.default_headers)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_classifier(mut self, classifier: StatusClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn with_on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ResponseMeta, Option<&RequestError>) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn with_request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptor = Some(interceptor);
        self
    }

    pub fn with_response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptor = Some(interceptor);
        self
    }

    /// Layer per-call overrides on top of the client defaults
    pub fn resolve(&self, options: &RequestOptions) -> ResolvedConfig {
        ResolvedConfig {
            base_url: options.base_url.clone().or_else(|| self.base_url.clone()),
            default_headers: options
                .default_headers
                .clone()
                .unwrap_or_else(|| self.default_headers.clone()),
            timeout: options.timeout.or(self.timeout),
            debug: options.debug.unwrap_or(self.debug),
            cache: options.cache.clone().unwrap_or_else(|| self.cache.clone()),
            cache_requested: options.cache.is_some(),
            retry: options.retry.clone().unwrap_or_else(|| self.retry.clone()),
            classifier: options
                .classifier
                .clone()
                .unwrap_or_else(|| self.classifier.clone()),
            on_error: options.on_error.clone().or_else(|| self.on_error.clone()),
            on_complete: options
                .on_complete
                .clone()
                .or_else(|| self.on_complete.clone()),
            request_interceptor: options
                .request_interceptor
                .clone()
                .or_else(|| self.request_interceptor.clone()),
            response_interceptor: options
                .response_interceptor
                .clone()
                .or_else(|| self.response_interceptor.clone()),
            upload_progress: options.on_upload_progress.clone(),
            download_progress: options.on_download_progress.clone(),
        }
    }
}

/// Effective settings for one call, resolved once before the first attempt
#[derive(Clone)]
pub struct ResolvedConfig {
    pub base_url: Option<String>,
    pub default_headers: Headers,
    pub timeout: Option<Duration>,
    pub debug: bool,
    pub cache: CachePolicy,
    /// The call carried its own cache policy
    pub cache_requested: bool,
    pub retry: RetryPolicy,
    pub classifier: StatusClassifier,
    pub on_error: Option<ErrorCallback>,
    pub on_complete: Option<CompletionCallback>,
    pub request_interceptor: Option<Arc<dyn RequestInterceptor>>,
    pub response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
    pub upload_progress: Option<ProgressCallback>,
    pub download_progress: Option<ProgressCallback>,
}

impl ResolvedConfig {
    /// Caching applies when a max age is set and the method is read-only or
    /// the call asked for caching itself
    pub fn caches(&self, method: Method) -> bool {
        self.cache.is_enabled() && (method.is_read_only() || self.cache_requested)
    }

    pub fn resolve_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        resolve_url(self.base_url.as_deref(), path, query)
    }
}

/// Join `path` onto `base_url` (unless `path` is already absolute) and append
/// `query` after any parameters already present in the path
pub fn resolve_url(base_url: Option<&str>, path: &str, query: &[(String, String)]) -> Result<Url> {
    let joined = if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        let base = base_url.ok_or_else(|| {
            RequestError::invalid_request(format!("Relative path {} without a base URL", path))
        })?;
        match (base.ends_with('/'), path.starts_with('/')) {
            (true, true) => format!("{}{}", base, &path[1..]),
            (false, false) if !path.is_empty() => format!("{}/{}", base, path),
            _ => format!("{}{}", base, path),
        }
    };

    let mut url = Url::parse(&joined)
        .map_err(|e| RequestError::invalid_request(format!("Invalid URL {}: {}", joined, e)))?;

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_url_joins_and_merges_query() {
        let url = resolve_url(Some("https://api.local/v1"), "/posts?sort=asc", &q(&[("page", "2")])).unwrap();
        assert_eq!(url.as_str(), "https://api.local/v1/posts?sort=asc&page=2");

        let url = resolve_url(Some("https://api.local/v1/"), "posts", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.local/v1/posts");

        let url = resolve_url(Some("https://ignored.local"), "http://other.local/x", &[]).unwrap();
        assert_eq!(url.host_str(), Some("other.local"));
    }

    #[test]
    fn test_relative_path_without_base_is_invalid() {
        let err = resolve_url(None, "/posts", &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_per_call_overrides_win() {
        let config = ClientConfig::new()
            .with_base_url("https://a.local")
            .with_timeout(Some(Duration::from_secs(30)))
            .with_cache(CachePolicy::with_max_age(Duration::from_secs(60)));

        let options = RequestOptions {
            base_url: Some("https://b.local".into()),
            timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let resolved = config.resolve(&options);

        assert_eq!(resolved.base_url.as_deref(), Some("https://b.local"));
        assert_eq!(resolved.timeout, Some(Duration::from_secs(1)));
        assert_eq!(resolved.cache.max_age, Duration::from_secs(60));
        assert!(!resolved.cache_requested);
        // Client config untouched
        assert_eq!(config.base_url.as_deref(), Some("https://a.local"));
    }

    #[test]
    fn test_per_call_default_headers() {
        let config = ClientConfig::new().with_header("X-Client", "hyperclient");
        assert_eq!(
            config.resolve(&RequestOptions::default()).default_headers.get("X-Client"),
            Some(&"hyperclient".to_string())
        );

        let options = RequestOptions {
            default_headers: Some(Headers::new()),
            ..Default::default()
        };
        assert!(config.resolve(&options).default_headers.is_empty());
    }

    #[test]
    fn test_cache_applies_to_get_or_explicit_request() {
        let config = ClientConfig::new().with_cache(CachePolicy::with_max_age(Duration::from_secs(60)));

        let resolved = config.resolve(&RequestOptions::default());
        assert!(resolved.caches(Method::Get));
        assert!(!resolved.caches(Method::Post));

        let options = RequestOptions {
            cache: Some(CachePolicy::with_max_age(Duration::from_secs(5))),
            ..Default::default()
        };
        assert!(config.resolve(&options).caches(Method::Post));

        let disabled = ClientConfig::new().resolve(&RequestOptions::default());
        assert!(!disabled.caches(Method::Get));
    }
}
