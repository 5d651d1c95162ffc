//! Response caching
//!
//! Entries are immutable: a refresh writes a new [`CacheEntry`] over the old
//! key. Stores are shared by every in-flight call of a client and must be
//! safe for concurrent use.

pub mod key;
pub mod memory;

pub use key::cache_key;
pub use memory::MemoryCacheStore;

use crate::core::envelope::RawResponse;
use crate::core::request::Method;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Caching behaviour for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long an entry stays valid; zero disables caching
    pub max_age: Duration,
    /// Store capacity; only read when a client builds its default store
    pub capacity: usize,
    /// Skip the lookup but still write the fresh response
    pub force_refresh: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::ZERO,
            capacity: 100,
            force_refresh: false,
        }
    }
}

impl CachePolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            max_age,
            ..Self::default()
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.max_age.is_zero()
    }
}

/// A cached response
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub method: Method,
    pub url: String,
    pub response: RawResponse,
    pub created_at: DateTime<Utc>,
    pub max_age: Duration,
}

impl CacheEntry {
    pub fn new(
        key: impl Into<String>,
        method: Method,
        url: impl Into<String>,
        response: RawResponse,
        max_age: Duration,
    ) -> Self {
        Self::with_created_at(key, method, url, response, max_age, Utc::now())
    }

    pub fn with_created_at(
        key: impl Into<String>,
        method: Method,
        url: impl Into<String>,
        response: RawResponse,
        max_age: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            method,
            url: url.into(),
            response,
            created_at,
            max_age,
        }
    }

    /// Instant the entry stops being valid; `None` if it never does
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let age = chrono::Duration::from_std(self.max_age).ok()?;
        self.created_at.checked_add_signed(age)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expiry| now < expiry)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Storage backend for cached responses
///
/// The in-process [`MemoryCacheStore`] is the default; durable stores plug
/// in behind the same interface.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a valid entry; expired entries are evicted and reported absent
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Insert or replace; evicts the oldest entry when full and `key` is new
    async fn set(&self, key: String, entry: CacheEntry);

    async fn delete(&self, key: &str) -> bool;

    async fn clear(&self);

    /// Remove every entry that expired before `cutoff`; returns how many
    async fn cleanup(&self, cutoff: DateTime<Utc>) -> usize;

    async fn size(&self) -> usize;
}
