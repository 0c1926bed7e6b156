//! Single-slot timer: at most one pending callback, cancel-then-reschedule.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Owns at most one pending timer task.
///
/// `schedule` always cancels the previous timer first. The callback receives
/// the slot generation it was scheduled under and must call [`TimerSlot::claim`]
/// with it while holding the owner's lock: a timer that woke up just as it was
/// cancelled or replaced fails the claim and does nothing.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    generation: u64,
    handle: Option<AbortHandle>,
}

impl TimerSlot {
    pub(crate) fn schedule<F>(&mut self, runtime: &Handle, delay: Duration, on_fire: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let deadline = Instant::now() + delay;
        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire(generation);
        });
        self.handle = Some(task.abort_handle());
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Consume the pending timer if `generation` is still the live one.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && self.generation == generation {
            self.handle = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
