//! # HyperFetch
//!
//! HTTP client built around a single request pipeline:
//!
//! ```text
//! cache lookup -> request interceptor -> transport -> response interceptor
//!     -> classify -> parse -> cache write
//!            ^                                |
//!            +------ retry (backoff) ---------+
//! ```
//!
//! - **StatusClassifier**: configurable status-code verdicts
//! - **CacheStore**: TTL + capacity cache, in-memory by default
//! - **RetryPolicy**: exponential backoff with jitter and a custom evaluator
//! - **Transport**: pluggable, `reqwest` by default
//!
//! Every call returns a [`ResponseEnvelope`]; failures are values, not
//! errors. Only disposal and [`HttpClient::download`] return `Err`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hyperfetch::*;
//! use std::time::Duration;
//!
//! let client = HttpClient::new(
//!     ClientConfig::new()
//!         .with_base_url("https://jsonplaceholder.typicode.com")
//!         .with_cache(CachePolicy::with_max_age(Duration::from_secs(300))),
//! )?;
//!
//! let post = client.get("/posts/1").await?;
//! if let Some(json) = post.payload().and_then(Payload::as_json) {
//!     println!("{}", json["title"]);
//! }
//! ```

pub mod cache;
pub mod core;
pub mod error;
pub mod policy;
pub mod settings;
pub mod transport;

pub use cache::{cache_key, CacheEntry, CachePolicy, CacheStore, MemoryCacheStore};
pub use self::core::*;
pub use error::{BoxError, ErrorKind, RequestError, Result};
pub use policy::{RetryDecision, RetryEvaluator, RetryPolicy, StatusCategory, StatusClassifier, JITTER_FACTOR};
pub use settings::{ClientSettings, SettingsError};
pub use transport::{BodyStream, EncodedBody, FilePart, ReqwestTransport, Transport, TransportRequest, TransportResponse};
