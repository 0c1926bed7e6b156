//! Async view of an [`ExternalStore`] through a `tokio::sync::watch` channel.

use std::sync::Arc;

use tokio::sync::watch;

use crate::store::{ExternalStore, Subscription};

/// Holds a subscription on a store and mirrors its snapshot into a watch
/// channel, so async code can `await` changes instead of registering a
/// callback. Dropping it unsubscribes.
///
/// Only the latest snapshot is kept; bursts of changes coalesce.
pub struct StoreWatch<T> {
    receiver: watch::Receiver<Arc<T>>,
    _subscription: Subscription,
}

impl<T: Send + Sync + 'static> StoreWatch<T> {
    pub fn new<S>(store: S) -> Self
    where
        S: ExternalStore<Snapshot = T> + Clone + Send + Sync + 'static,
    {
        let (sender, receiver) = watch::channel(store.snapshot());
        let source = store.clone();
        let subscription = store.subscribe(move || {
            let next = source.snapshot();
            sender.send_if_modified(|current| {
                if Arc::ptr_eq(current, &next) {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        });
        Self {
            receiver,
            _subscription: subscription,
        }
    }

    pub fn current(&self) -> Arc<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published snapshot. `None` once the store has
    /// dropped this listener (destroyed).
    pub async fn changed(&mut self) -> Option<Arc<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until a snapshot satisfies `predicate`, checking the current one first.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Option<Arc<T>> {
        let snapshot = self.receiver.wait_for(|s| predicate(s)).await.ok()?;
        Some(snapshot.clone())
    }

    /// Extra receiver for handing to another task.
    pub fn receiver(&self) -> watch::Receiver<Arc<T>> {
        self.receiver.clone()
    }
}

impl<T> std::fmt::Debug for StoreWatch<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWatch").finish_non_exhaustive()
    }
}
