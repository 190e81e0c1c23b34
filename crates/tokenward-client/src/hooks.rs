//! Listener registries.
//!
//! A [`Hook`] holds any number of listeners and calls each of them when
//! notified. Listeners run in registration order; a listener that panics
//! is logged and skipped, and the rest still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Listeners<T> = Mutex<Vec<(u64, Listener<T>)>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A registry of listeners called with `&T`.
pub struct Hook<T> {
    name: &'static str,
    listeners: Arc<Listeners<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> Hook<T> {
    /// An empty hook. `name` shows up in panic reports.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Adds a listener. Dropping the handle does not remove it; call
    /// [`HookHandle::stop`].
    pub fn register(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> HookHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::new(listener)));

        let weak: Weak<Listeners<T>> = Arc::downgrade(&self.listeners);
        HookHandle {
            stop: Some(Box::new(move || {
                if let Some(listeners) = weak.upgrade() {
                    lock(&listeners).retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Calls every listener with `value`.
    ///
    /// Listeners are snapshotted first, so one may register or stop
    /// listeners without deadlocking.
    pub fn each(&self, value: &T) {
        let snapshot: Vec<Listener<T>> =
            lock(&self.listeners).iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                error!(hook = self.name, "exception in hook callback");
            }
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> std::fmt::Debug for Hook<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Returned by registrations; removes the listener on [`stop`](Self::stop).
pub struct HookHandle {
    stop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl HookHandle {
    /// Removes the listener. Harmless if the hook is already gone.
    pub fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
    }
}

impl std::fmt::Debug for HookHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookHandle").finish_non_exhaustive()
    }
}
