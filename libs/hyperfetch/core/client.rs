use crate::cache::{cache_key, CacheEntry, CacheStore, MemoryCacheStore};
use crate::core::config::{ClientConfig, ResolvedConfig};
use crate::core::envelope::{
    ContentKind, DownloadSummary, Payload, RawResponse, ResponseEnvelope, ResponseMeta,
};
use crate::core::interceptor::OutgoingRequest;
use crate::core::parser::{DefaultParser, JsonParser, ResponseParser};
use crate::core::request::{merge_headers, Headers, Method, Request};
use crate::error::{RequestError, Result};
use crate::policy::RetryDecision;
use crate::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
use chrono::Utc;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Head of a received response, kept for error envelopes
#[derive(Debug, Clone)]
struct ResponseHead {
    status: u16,
    headers: Headers,
    content_kind: ContentKind,
}

/// Why an attempt failed, plus whatever response it got
#[derive(Debug)]
struct AttemptFailure {
    error: RequestError,
    head: Option<ResponseHead>,
}

impl From<RequestError> for AttemptFailure {
    fn from(error: RequestError) -> Self {
        Self { error, head: None }
    }
}

/// HTTP client running every call through the cache / intercept / retry
/// pipeline
///
/// Cloning is cheap; clones share the configuration, transport, cache store
/// and disposal flag.
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    cache: Arc<dyn CacheStore>,
    disposed: Arc<watch::Sender<bool>>,
}

impl HttpClient {
    /// Client backed by `reqwest` and an in-memory cache
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let cache = Arc::new(MemoryCacheStore::new(config.cache.capacity));
        Self::with_parts(config, transport, cache)
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        let (disposed, _) = watch::channel(false);
        Self {
            config: Arc::new(config),
            transport,
            cache,
            disposed: Arc::new(disposed),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Send a request and decode the body without a target type
    pub async fn send(&self, request: impl Into<Request>) -> Result<ResponseEnvelope<Payload>> {
        self.send_with(request, &DefaultParser).await
    }

    /// Send a request and deserialize a JSON body into `T`
    pub async fn send_json<T>(&self, request: impl Into<Request>) -> Result<ResponseEnvelope<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.send_with(request, &JsonParser::<T>::new()).await
    }

    /// Send a request and decode the body with `parser`
    ///
    /// Every failure comes back as an error envelope. The only `Err` is
    /// [`ErrorKind::Disposed`](crate::error::ErrorKind::Disposed), returned
    /// when the client is disposed before or during the call.
    pub async fn send_with<T, P>(
        &self,
        request: impl Into<Request>,
        parser: &P,
    ) -> Result<ResponseEnvelope<T>>
    where
        T: Send,
        P: ResponseParser<T> + ?Sized,
    {
        let request = request.into();
        self.ensure_active()?;
        let cancelled = Self::wait_disposed(self.disposed.subscribe());
        tokio::pin!(cancelled);

        tokio::select! {
            biased;
            _ = &mut cancelled => Err(RequestError::disposed()),
            envelope = self.execute(&request, parser) => Ok(envelope),
        }
    }

    pub async fn get(&self, path: impl Into<String>) -> Result<ResponseEnvelope<Payload>> {
        self.send(Request::get(path)).await
    }

    pub async fn post(
        &self,
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<ResponseEnvelope<Payload>> {
        self.send(Request::post(path).json(body)).await
    }

    pub async fn put(
        &self,
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<ResponseEnvelope<Payload>> {
        self.send(Request::put(path).json(body)).await
    }

    pub async fn patch(
        &self,
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<ResponseEnvelope<Payload>> {
        self.send(Request::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: impl Into<String>) -> Result<ResponseEnvelope<Payload>> {
        self.send(Request::delete(path)).await
    }

    /// Stream a response body to `dest`
    ///
    /// Unlike [`send`](Self::send) this raises its error directly. It runs a
    /// single attempt, never touches the cache and removes a partially
    /// written file on failure.
    pub async fn download(
        &self,
        request: impl Into<Request>,
        dest: impl AsRef<Path>,
    ) -> Result<DownloadSummary> {
        let request = request.into();
        let dest = dest.as_ref();
        self.ensure_active()?;
        let cancelled = Self::wait_disposed(self.disposed.subscribe());
        tokio::pin!(cancelled);

        let result = tokio::select! {
            biased;
            _ = &mut cancelled => Err(RequestError::disposed()),
            result = self.download_inner(&request, dest) => result,
        };

        if result.is_err() && tokio::fs::metadata(dest).await.is_ok() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!("Failed to remove partial download {}: {}", dest.display(), e);
            }
        }
        result
    }

    /// Remove every cached response
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Remove cached responses that have already expired
    pub async fn cleanup_cache(&self) -> usize {
        self.cache.cleanup(Utc::now()).await
    }

    /// Tear the client down
    ///
    /// In-flight calls, including those sleeping between retries, fail with
    /// a disposed error; later calls fail immediately.
    pub async fn dispose(&self) {
        self.disposed.send_replace(true);
        self.cache.clear().await;
        debug!("HTTP client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            Err(RequestError::disposed())
        } else {
            Ok(())
        }
    }

    fn wait_disposed(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send {
        async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn execute<T, P>(&self, request: &Request, parser: &P) -> ResponseEnvelope<T>
    where
        T: Send,
        P: ResponseParser<T> + ?Sized,
    {
        let started = Instant::now();
        let resolved = self.config.resolve(&request.options);
        let method = request.method;

        let url = match resolved.resolve_url(&request.path, &request.query) {
            Ok(url) => url,
            Err(error) => {
                let failure = AttemptFailure { error, head: None };
                return self.fail(&resolved, method, request.path.clone(), failure, started, 0);
            }
        };

        let key = resolved.caches(method).then(|| {
            cache_key(
                method,
                &url,
                &request.body,
                &request.attachments,
                &request.headers,
            )
        });

        if let Some(ref key) = key {
            if resolved.cache.force_refresh {
                if resolved.debug {
                    debug!("[hyperfetch] {} {} forcing refresh", method, url);
                }
            } else if let Some(entry) = self.cache.get(key).await {
                match parser.parse(&entry.response) {
                    Ok(payload) => {
                        if resolved.debug {
                            debug!("[hyperfetch] {} {} served from cache", method, url);
                        }
                        let meta = self.meta(&resolved, method, &url, &entry.response, started, 0, true);
                        if let Some(ref on_complete) = resolved.on_complete {
                            on_complete(&meta, None);
                        }
                        return ResponseEnvelope::success(meta, payload);
                    }
                    Err(e) => debug!("Cached response for {} no longer parses: {}", url, e),
                }
            }
        }

        let mut attempt: u32 = 1;
        loop {
            if resolved.debug {
                debug!("[hyperfetch] attempt {} {} {}", attempt, method, url);
            }

            match self.attempt(&resolved, request, &url, parser).await {
                Ok((raw, payload)) => {
                    if resolved.debug {
                        debug!("[hyperfetch] {} {} -> {}", method, url, raw.status);
                    }
                    let meta = self.meta(&resolved, method, &url, &raw, started, attempt, false);

                    if let Some(key) = key.filter(|_| meta.success) {
                        let entry = CacheEntry::new(
                            key.clone(),
                            method,
                            url.as_str(),
                            raw,
                            resolved.cache.max_age,
                        );
                        self.cache.set(key, entry).await;
                    }

                    if let Some(ref on_complete) = resolved.on_complete {
                        on_complete(&meta, None);
                    }
                    return ResponseEnvelope::success(meta, payload);
                }
                Err(failure) => match resolved.retry.decide(&failure.error, attempt) {
                    RetryDecision::Retry(delay) => {
                        if resolved.debug {
                            debug!(
                                "[hyperfetch] attempt {} failed ({}), retrying in {:?}",
                                attempt, failure.error, delay
                            );
                        }
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::Stop => {
                        if resolved.debug {
                            debug!(
                                "[hyperfetch] attempt {} failed ({}), giving up",
                                attempt, failure.error
                            );
                        }
                        return self.fail(&resolved, method, url.to_string(), failure, started, attempt);
                    }
                },
            }
        }
    }

    /// One pass through intercept, transport, classify and parse
    async fn attempt<T, P>(
        &self,
        resolved: &ResolvedConfig,
        request: &Request,
        url: &Url,
        parser: &P,
    ) -> std::result::Result<(RawResponse, T), AttemptFailure>
    where
        P: ResponseParser<T> + ?Sized,
    {
        let context = |error: RequestError| error.with_context(request.method, url.as_str());

        let raw = self
            .exchange(resolved, request, url)
            .await
            .map_err(context)?;

        let head = ResponseHead {
            status: raw.status,
            headers: raw.headers.clone(),
            content_kind: raw.content_kind,
        };

        if resolved.classifier.is_error(raw.status) {
            let error = RequestError::status(
                resolved.classifier.error_kind(raw.status),
                raw.status,
                raw.text().trim(),
            );
            return Err(AttemptFailure {
                error: context(error),
                head: Some(head),
            });
        }

        match parser.parse(&raw) {
            Ok(payload) => Ok((raw, payload)),
            Err(e) => Err(AttemptFailure {
                error: context(RequestError::parse(e)),
                head: Some(head),
            }),
        }
    }

    /// Intercept, send and fully read one response, bounded by the timeout
    async fn exchange(&self, resolved: &ResolvedConfig, request: &Request, url: &Url) -> Result<RawResponse> {
        let exchange = async {
            let response = self.open(resolved, request, url).await?;
            let status = response.status;
            let headers = response.headers.clone();
            let body = response.read_body(resolved.download_progress.as_ref()).await?;
            Ok::<_, RequestError>(RawResponse {
                status,
                content_kind: ContentKind::from_headers(&headers),
                headers,
                body,
            })
        };

        match resolved.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| RequestError::timeout(limit))?,
            None => exchange.await,
        }
    }

    /// Build, intercept and send the request; returns the unread response
    async fn open(&self, resolved: &ResolvedConfig, request: &Request, url: &Url) -> Result<TransportResponse> {
        let mut outgoing = OutgoingRequest {
            method: request.method,
            url: url.clone(),
            headers: merge_headers(&resolved.default_headers, &request.headers),
            body: request.body.clone(),
            attachments: request.attachments.clone(),
        };

        if let Some(ref interceptor) = resolved.request_interceptor {
            outgoing = interceptor
                .on_request(outgoing)
                .await
                .map_err(RequestError::interceptor)?;
        }

        let body = outgoing.encode()?;
        let response = self
            .transport
            .execute(TransportRequest {
                method: outgoing.method,
                url: outgoing.url,
                headers: outgoing.headers,
                body,
                timeout: resolved.timeout,
                upload_progress: resolved.upload_progress.clone(),
            })
            .await?;

        match resolved.response_interceptor {
            Some(ref interceptor) => interceptor
                .on_response(response)
                .await
                .map_err(RequestError::interceptor),
            None => Ok(response),
        }
    }

    async fn download_inner(&self, request: &Request, dest: &Path) -> Result<DownloadSummary> {
        let started = Instant::now();
        let resolved = self.config.resolve(&request.options);
        let url = resolved.resolve_url(&request.path, &request.query)?;
        let context = |error: RequestError| error.with_context(request.method, url.as_str());

        if resolved.debug {
            debug!("[hyperfetch] download {} {} -> {}", request.method, url, dest.display());
        }

        let opened = async {
            let response = self.open(&resolved, request, &url).await?;
            if resolved.classifier.is_success(response.status) {
                return Ok(response);
            }
            let status = response.status;
            let body = response.read_body(None).await.unwrap_or_default();
            let kind = if resolved.classifier.is_error(status) {
                resolved.classifier.error_kind(status)
            } else {
                crate::error::ErrorKind::HttpStatus
            };
            Err::<TransportResponse, _>(RequestError::status(
                kind,
                status,
                String::from_utf8_lossy(&body).trim(),
            ))
        };

        let response = match resolved.timeout {
            Some(limit) => tokio::time::timeout(limit, opened)
                .await
                .map_err(|_| RequestError::timeout(limit))
                .and_then(|r| r),
            None => opened.await,
        }
        .map_err(context)?;

        let status = response.status;
        let total = response.content_length;
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| context(RequestError::io(e)))?;

        let mut body = response.body;
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(context)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| context(RequestError::io(e)))?;
            written += chunk.len() as u64;
            if let Some(ref progress) = resolved.download_progress {
                progress(written, total);
            }
        }
        file.flush().await.map_err(|e| context(RequestError::io(e)))?;

        if resolved.debug {
            debug!("[hyperfetch] download of {} finished ({} bytes)", url, written);
        }

        Ok(DownloadSummary {
            path: dest.to_path_buf(),
            status,
            bytes_written: written,
            duration: started.elapsed(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn meta(
        &self,
        resolved: &ResolvedConfig,
        method: Method,
        url: &Url,
        raw: &RawResponse,
        started: Instant,
        attempts: u32,
        from_cache: bool,
    ) -> ResponseMeta {
        ResponseMeta {
            status: Some(raw.status),
            headers: raw.headers.clone(),
            content_kind: raw.content_kind,
            success: resolved.classifier.is_success(raw.status),
            method,
            url: url.to_string(),
            duration: started.elapsed(),
            attempts,
            from_cache,
        }
    }

    /// Error envelope plus callbacks: the per-call or global error handler
    /// (whichever resolved), then completion
    fn fail<T>(
        &self,
        resolved: &ResolvedConfig,
        method: Method,
        url: String,
        failure: AttemptFailure,
        started: Instant,
        attempts: u32,
    ) -> ResponseEnvelope<T> {
        let AttemptFailure { error, head } = failure;
        let error = if error.url().is_none() {
            error.with_context(method, url.clone())
        } else {
            error
        };

        let meta = ResponseMeta {
            status: head.as_ref().map(|h| h.status),
            headers: head.as_ref().map(|h| h.headers.clone()).unwrap_or_default(),
            content_kind: head.as_ref().map_or(ContentKind::Unknown, |h| h.content_kind),
            success: false,
            method,
            url,
            duration: started.elapsed(),
            attempts,
            from_cache: false,
        };

        if let Some(ref on_error) = resolved.on_error {
            on_error(&error);
        }
        if let Some(ref on_complete) = resolved.on_complete {
            on_complete(&meta, Some(&error));
        }

        ResponseEnvelope::failure(meta, error)
    }
}
