//! Listener registry and fan-out.
//!
//! Every decoded event is delivered synchronously to each registered
//! listener, in registration order. A listener that panics is logged and
//! skipped; the remaining listeners still receive the event.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::identifiers::ListenerId;
use crate::protocol::ClientEvent;

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
///
/// Called for every event, including synthetic lifecycle events.
pub type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

// ============================================================================
// ListenerRegistry
// ============================================================================

/// Set of listeners keyed by identity.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    /// Registers a listener.
    pub(crate) fn add(self: &Arc<Self>, listener: Listener) -> ListenerHandle {
        let id = ListenerId::generate();
        let mut listeners = self.listeners.lock();
        listeners.push((id, listener));
        debug!(listener = %id, total = listeners.len(), "Listener added");

        ListenerHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;

        if removed {
            debug!(listener = %id, remaining = listeners.len(), "Listener removed");
        }
        removed
    }

    /// Returns the number of listeners.
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Delivers `event` to every listener.
    ///
    /// The registry lock is not held while listeners run, so a listener may
    /// add or remove listeners (including itself).
    pub(crate) fn dispatch(&self, event: &ClientEvent) {
        let listeners: Vec<(ListenerId, Listener)> = self.listeners.lock().clone();

        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(listener = %id, kind = event.kind(), "Error in listener");
            }
        }
    }
}

// ============================================================================
// ListenerHandle
// ============================================================================

/// Deregistration handle returned by `add_listener`.
///
/// Dropping the handle does not remove the listener; call
/// [`ListenerHandle::remove`].
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    /// Returns the listener's id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the listener. Returns `false` if it was already removed or
    /// the manager is gone.
    pub fn remove(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id))
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let listener: Listener = Arc::new(move |_event: &ClientEvent| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_dispatch_reaches_every_listener() {
        let registry = Arc::new(ListenerRegistry::default());
        let (a, listener_a) = counter();
        let (b, listener_b) = counter();
        registry.add(listener_a);
        registry.add(listener_b);

        registry.dispatch(&ClientEvent::Connected);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = Arc::new(ListenerRegistry::default());
        registry.add(Arc::new(|_event: &ClientEvent| panic!("listener failure")));
        let (count, listener) = counter();
        registry.add(listener);

        registry.dispatch(&ClientEvent::Disconnected);
        registry.dispatch(&ClientEvent::Connected);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handle_removes_listener() {
        let registry = Arc::new(ListenerRegistry::default());
        let (count, listener) = counter();
        let handle = registry.add(listener);

        assert!(handle.remove());
        assert!(!handle.remove());
        registry.dispatch(&ClientEvent::Connected);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_handle_outliving_registry() {
        let registry = Arc::new(ListenerRegistry::default());
        let (_count, listener) = counter();
        let handle = registry.add(listener);
        drop(registry);

        assert!(!handle.remove());
    }

    #[test]
    fn test_same_callback_registered_twice_is_two_listeners() {
        let registry = Arc::new(ListenerRegistry::default());
        let (count, listener) = counter();
        let first = registry.add(Arc::clone(&listener));
        registry.add(listener);

        registry.dispatch(&ClientEvent::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(first.remove());
        registry.dispatch(&ClientEvent::Connected);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
