// Process-wide subscriber registry shared by every widget.

use crate::domain::Subscriber;
use std::{
    collections::HashMap,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, RwLock},
};
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId::new();
        self.register_as(id, subscriber);
        id
    }

    /// Registering an id twice replaces the earlier subscriber.
    pub fn register_as(&self, id: SubscriberId, subscriber: Arc<dyn Subscriber>) {
        self.write().insert(id, subscriber);
    }

    pub fn unregister(&self, id: SubscriberId) -> bool {
        self.write().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `deliver` once per subscriber registered at the time of the call.
    /// The lock is released before any callback runs, and a panicking
    /// subscriber is logged and skipped.
    pub fn notify(&self, deliver: impl Fn(&dyn Subscriber)) {
        let snapshot: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, subscriber)| (*id, subscriber.clone()))
            .collect();

        for (id, subscriber) in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| deliver(subscriber.as_ref())));
            if outcome.is_err() {
                error!(subscriber = %id, "subscriber callback panicked");
            }
        }
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriberId, Arc<dyn Subscriber>>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }
}
