//! Key change subscriber registry.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use deck_core::{KeyEvent, KeyHandler, SubscriptionId};
use parking_lot::RwLock;
use tracing::warn;

type SharedHandler = Arc<dyn Fn(KeyEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, SharedHandler)>>,
}

impl Subscribers {
    pub fn subscribe(&self, handler: KeyHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::from(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let len = handlers.len();
        handlers.retain(|(i, _)| *i != id);
        handlers.len() != len
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Deliver an event to every subscriber. A panicking subscriber is logged
    /// and skipped; the others still receive the event.
    pub fn dispatch(&self, event: KeyEvent) {
        // Snapshot so handlers may (un)subscribe without deadlocking
        let handlers: Vec<SharedHandler> =
            self.handlers.read().iter().map(|(_, h)| h.clone()).collect();

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!("key subscriber panicked while handling {event:?}");
            }
        }
    }
}
