//! Typed publish/subscribe registry.
//!
//! [`EventHub`] maps an event kind to an ordered list of listeners. It holds no
//! business logic: `emit` invokes listeners and hands back whatever they
//! failed with, leaving reporting to the caller.
//!
//! Listener identity is the `Arc` allocation, so removing a listener requires
//! the same `Arc` that was registered.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a listener callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// A registered callback.
pub type Listener<P> = Arc<dyn Fn(&P) -> Result<(), ListenerError> + Send + Sync>;

/// A listener that failed during [`EventHub::emit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Zero-based position of the listener in the dispatch order.
    pub position: usize,
    pub error: ListenerError,
}

/// Registry mapping event kinds to ordered listeners.
pub struct EventHub<K, P> {
    listeners: Mutex<HashMap<K, Vec<Listener<P>>>>,
}

impl<K, P> Default for EventHub<K, P> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, P> std::fmt::Debug for EventHub<K, P>
where
    K: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.lock();
        let counts: Vec<_> = listeners.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventHub").field("listeners", &counts).finish()
    }
}

fn same_listener<P>(a: &Listener<P>, b: &Listener<P>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units.
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

impl<K, P> EventHub<K, P>
where
    K: Copy + Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `kind`. Adding the same listener twice
    /// registers it twice.
    pub fn on(&self, kind: K, listener: Listener<P>) {
        self.listeners.lock().entry(kind).or_default().push(listener);
    }

    /// Removes every registration of `listener` for `kind`.
    ///
    /// Drops the kind's entry once its last listener is gone. Unknown
    /// listeners are ignored.
    pub fn off(&self, kind: K, listener: &Listener<P>) {
        let mut listeners = self.listeners.lock();
        let Some(registered) = listeners.get_mut(&kind) else {
            return;
        };
        registered.retain(|l| !same_listener(l, listener));
        if registered.is_empty() {
            listeners.remove(&kind);
        }
    }

    /// Invokes every listener registered for `kind`, in registration order.
    ///
    /// The listener list is snapshotted up front so listeners may call
    /// [`on`](Self::on) or [`off`](Self::off) re-entrantly. A listener removed
    /// while the dispatch is running is skipped. Failures do not stop the
    /// dispatch; they are returned to the caller.
    pub fn emit(&self, kind: K, payload: &P) -> Vec<ListenerFailure> {
        let snapshot = match self.listeners.lock().get(&kind) {
            Some(registered) => registered.clone(),
            None => return Vec::new(),
        };

        let mut failures = Vec::new();
        for (position, listener) in snapshot.iter().enumerate() {
            if !self.is_registered(kind, listener) {
                continue;
            }
            if let Err(error) = listener(payload) {
                failures.push(ListenerFailure { position, error });
            }
        }
        failures
    }

    /// Number of registrations for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: K) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Whether any listener is registered for `kind`.
    #[must_use]
    pub fn has_listeners(&self, kind: K) -> bool {
        self.listeners.lock().contains_key(&kind)
    }

    /// Drops every registration for every kind.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    fn is_registered(&self, kind: K, listener: &Listener<P>) -> bool {
        self.listeners
            .lock()
            .get(&kind)
            .is_some_and(|registered| registered.iter().any(|l| same_listener(l, listener)))
    }
}
