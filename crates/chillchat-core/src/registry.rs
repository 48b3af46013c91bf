//! Listener registry
//!
//! Multi-subscriber fan-out for connection and message events. Delivery is
//! synchronous and in registration order; a panicking listener is contained
//! and logged so the remaining listeners still run. Notification snapshots
//! the listener list first, so a listener may add or remove listeners
//! without deadlocking (changes take effect from the next notify).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

// ----------------------------------------------------------------------------
// Listener Handle
// ----------------------------------------------------------------------------

/// Subscription handle returned by [`ListenerSet::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ----------------------------------------------------------------------------
// Listener Set
// ----------------------------------------------------------------------------

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// One kind of event fan-out (the service keeps separate sets for message
/// and connection events; ordering is only guaranteed within a set)
pub struct ListenerSet<E> {
    name: &'static str,
    listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E> ListenerSet<E> {
    /// Create an empty set; `name` labels log lines
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener, returning its removal handle
    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; false if the handle is unknown
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invoke every registered listener with `event`, in registration order
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<(ListenerId, Listener<E>)> = self
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(
                    listener_id = id.0,
                    "{} listener panicked during notify, continuing with the rest", self.name
                );
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener<E>)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E> std::fmt::Debug for ListenerSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
