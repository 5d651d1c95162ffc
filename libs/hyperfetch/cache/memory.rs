use super::{CacheEntry, CacheStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// In-process cache store
///
/// A single mutex guards the map, so a `get` racing a `set` on the same key
/// observes either the old or the new entry, never a mix. `capacity == 0`
/// means unbounded.
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    capacity: usize,
}

impl MemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lookup against an explicit clock
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => Some(entry.clone()),
            Some(_) => {
                debug!("Cache entry {} expired, evicting", key);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, entry: CacheEntry) {
        let mut entries = self.entries.lock();

        if self.capacity > 0 && !entries.contains_key(&key) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!("Cache full ({}), evicting {}", self.capacity, oldest);
                entries.remove(&oldest);
            }
        }

        entries.insert(key, entry);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    async fn set(&self, key: String, entry: CacheEntry) {
        self.insert(key, entry);
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    async fn clear(&self) {
        self.entries.lock().clear();
    }

    async fn cleanup(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at().map_or(true, |expiry| expiry >= cutoff));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Cleaned up {} expired cache entries", removed);
        }
        removed
    }

    async fn size(&self) -> usize {
        self.len()
    }
}
