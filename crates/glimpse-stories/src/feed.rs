use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::broadcast;
use tracing::trace;

use glimpse_types::events::StoryEvent;

pub type Listener = Arc<dyn Fn(&StoryEvent) + Send + Sync>;

/// Fans story changes out to registered callbacks and to async subscribers.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    /// Async consumers (the WebSocket gateway) receive every event
    broadcast_tx: broadcast::Sender<StoryEvent>,

    /// Synchronous callbacks: listener id -> callback
    listeners: RwLock<HashMap<u64, Listener>>,

    next_id: AtomicU64,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(FeedInner {
                broadcast_tx,
                listeners: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to story events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<StoryEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Register a callback. It stays registered until the returned
    /// `Subscription` is unsubscribed or dropped.
    pub fn on_change(&self, listener: Listener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, listener);
        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, event: StoryEvent) {
        // Call listeners outside the lock so they may (un)subscribe themselves.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();

        trace!("publishing {:?} to {} listeners", event, listeners.len());
        for listener in &listeners {
            listener(&event);
        }

        let _ = self.inner.broadcast_tx.send(event);
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `on_stories_changed`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    id: u64,
    feed: Weak<FeedInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.feed.upgrade() {
            inner
                .listeners
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.id);
        }
    }
}
