//! Observer plumbing shared by every store.
//!
//! A store exposes a synchronous `snapshot()` and a `subscribe(listener)`
//! that hands back a [`Subscription`]. Listeners take no arguments; they are
//! told "something changed" and read the latest snapshot themselves, so a
//! burst of changes may be coalesced into fewer reads.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Change callback registered with a store.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// An observable store with an immutable snapshot.
pub trait ExternalStore {
    type Snapshot;

    /// Register `listener`. The returned guard unsubscribes when dropped.
    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static;

    /// Current snapshot. Never blocks on I/O, never has side effects.
    fn snapshot(&self) -> Arc<Self::Snapshot>;
}

/// Handle returned by `subscribe`. Unsubscribes on drop or on
/// [`Subscription::unsubscribe`], whichever happens first.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription that is not attached to anything, handed out by
    /// stores that were already destroyed.
    pub fn inert() -> Self {
        Self { cancel: None }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Registered listeners of one store, in subscription order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl Listeners {
    pub(crate) fn insert(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Returns false when `id` was already gone.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clones of the current listeners, to be called once the store lock is released.
    pub(crate) fn to_vec(&self) -> Vec<Listener> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }
}

pub(crate) fn notify_all(listeners: Vec<Listener>) {
    for listener in listeners {
        listener();
    }
}

/// Lock a store mutex, recovering the data if a listener panicked while
/// another thread held it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
