//! Named-event subscriber registry
//!
//! Each event name maps to an ordered list of handlers. Dispatch snapshots
//! the list and calls handlers outside the lock, so a handler may subscribe
//! or unsubscribe without deadlocking. A handler that errors or panics is
//! logged and skipped; its siblings still run.

use crate::traits::BoxError;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Subscriber callback
pub type Handler = Arc<dyn Fn(&Value) -> Result<(), BoxError> + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct SubscriberRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one handler; returns whether it was registered
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    /// Remove every handler for `event`; returns how many were removed
    pub fn off_all(&self, event: &str) -> usize {
        self.handlers
            .lock()
            .remove(event)
            .map_or(0, |list| list.len())
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    pub fn count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }

    /// Call every handler for `event` in registration order; returns how many succeeded
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<Handler> = match self.handlers.lock().get(event) {
            Some(list) => list.iter().map(|(_, handler)| Arc::clone(handler)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for handler in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Subscriber for '{}' failed: {}", event, e),
                Err(_) => warn!("Subscriber for '{}' panicked", event),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            registry.on("tick", move |data| {
                seen.lock().push(format!("{}:{}", tag, data));
                Ok(())
            });
        }

        assert_eq!(registry.dispatch("tick", &json!(1)), 3);
        assert_eq!(*seen.lock(), vec!["a:1", "b:1", "c:1"]);
        assert_eq!(registry.dispatch("other", &json!(1)), 0);
    }

    #[test]
    fn test_failing_handlers_do_not_block_siblings() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicU64::new(0));

        registry.on("evt", |_| Err("boom".into()));
        registry.on("evt", |_| panic!("handler panic"));
        let counter = Arc::clone(&hits);
        registry.on("evt", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(registry.dispatch("evt", &Value::Null), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_and_off_all() {
        let registry = SubscriberRegistry::new();
        let first = registry.on("evt", |_| Ok(()));
        let second = registry.on("evt", |_| Ok(()));
        registry.on("other", |_| Ok(()));

        assert!(registry.off("evt", first));
        assert!(!registry.off("evt", first));
        assert_eq!(registry.count("evt"), 1);
        assert!(registry.off("evt", second));
        assert_eq!(registry.count("evt"), 0);

        assert_eq!(registry.off_all("other"), 1);
        assert_eq!(registry.off_all("other"), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_dispatch() {
        let registry = Arc::new(SubscriberRegistry::new());
        let inner = Arc::clone(&registry);
        registry.on("once", move |_| {
            inner.off_all("once");
            Ok(())
        });

        assert_eq!(registry.dispatch("once", &Value::Null), 1);
        assert_eq!(registry.count("once"), 0);
    }
}
