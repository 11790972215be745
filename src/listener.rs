//! Listener registry - weak multi-subscriber fan-out
//!
//! Registering a listener never keeps it alive. Subscribers own their
//! `Arc` and unsubscribe simply by dropping it; expired entries are pruned
//! lazily on the next registration or dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Set of weakly held listeners of type `L`.
///
/// `L` is usually a trait object such as `dyn ProcessManagerListener`.
pub struct ListenerProvider<L: ?Sized> {
    listeners: Mutex<Vec<Weak<L>>>,
}

impl<L: ?Sized> ListenerProvider<L> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Register `listener` without extending its lifetime.
    ///
    /// Adding the same listener twice registers it once.
    pub fn add_listener(&self, listener: &Arc<L>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        let weak = Arc::downgrade(listener);
        if !listeners.iter().any(|l| Weak::ptr_eq(l, &weak)) {
            listeners.push(weak);
        }
    }

    /// Unregister `listener`. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<L>) {
        let weak = Arc::downgrade(listener);
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| l.strong_count() > 0 && !Weak::ptr_eq(l, &weak));
        if listeners.len() == before {
            log::debug!("Removing a listener that was never registered");
        }
    }

    /// Snapshot of all listeners still alive right now.
    ///
    /// Changes to the registry after this call do not affect the snapshot.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `notify` for every live listener.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// are still notified and the panic never reaches the caller.
    pub fn notify(&self, event: &str, notify: impl Fn(&L)) {
        for listener in self.snapshot() {
            let result = catch_unwind(AssertUnwindSafe(|| notify(&listener)));
            if let Err(payload) = result {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!("E00100: Listener failed while handling {}: {}", event, reason);
            }
        }
    }
}

impl<L: ?Sized> Default for ListenerProvider<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for ListenerProvider<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerProvider")
            .field("listeners", &self.len())
            .finish()
    }
}
