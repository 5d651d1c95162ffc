//! Common test utilities for HyperFetch integration tests
//!
//! Provides a scripted in-process transport so pipeline behaviour can be
//! tested without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use hyperfetch::{
    ErrorKind, Headers, Method, RequestError, Result, Transport, TransportRequest,
    TransportResponse,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// One scripted transport outcome
#[derive(Debug, Clone)]
pub enum Reply {
    /// Respond with status, content type and body
    Respond {
        status: u16,
        content_type: &'static str,
        body: Vec<u8>,
    },
    /// Respond with the body split into chunks
    Chunked {
        status: u16,
        chunks: Vec<Vec<u8>>,
    },
    /// Fail without a response
    Fail(ErrorKind),
    /// Wait, then run the inner reply
    Delay(Duration, Box<Reply>),
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Reply::Respond {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Reply::Respond {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Reply::Delay(delay, Box::new(self))
    }
}

/// What the transport saw for one call
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: hyperfetch::EncodedBody,
}

/// Transport replaying a script; the last reply repeats once the script runs out
pub struct MockTransport {
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

impl MockTransport {
    pub fn new(script: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn always(reply: Reply) -> Arc<Self> {
        Self::new([reply])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut script = self.script.lock();
        let mut last = self.last.lock();
        if let Some(reply) = script.pop_front() {
            *last = Some(reply.clone());
            reply
        } else {
            last.clone().unwrap_or_else(|| Reply::Fail(ErrorKind::Network))
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(SeenRequest {
            method: request.method,
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        });

        let mut reply = self.next_reply();
        loop {
            match reply {
                Reply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                Reply::Respond {
                    status,
                    content_type,
                    body,
                } => {
                    let mut headers = Headers::new();
                    headers.insert("Content-Type".to_string(), content_type.to_string());
                    return Ok(TransportResponse::from_bytes(status, headers, body));
                }
                Reply::Chunked { status, chunks } => {
                    let total: usize = chunks.iter().map(Vec::len).sum();
                    let mut headers = Headers::new();
                    headers.insert(
                        "Content-Type".to_string(),
                        "application/octet-stream".to_string(),
                    );
                    return Ok(TransportResponse {
                        status,
                        headers,
                        content_length: Some(total as u64),
                        body: stream::iter(chunks.into_iter().map(Ok)).boxed(),
                    });
                }
                Reply::Fail(kind) => {
                    return Err(RequestError::new(kind, format!("scripted {:?} failure", kind)));
                }
            }
        }
    }
}

/// Thread-safe call counter for callbacks
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
