//! Workspace list store: REST polling plus a signal-only push channel.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use factory_shared::{
    ApiError, FactoryStateSnapshot, FetchStatus, TransportError, WorkspaceEntry, RELOAD_EVENT,
};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::api_client::WorkspaceSource;
use crate::store::{lock, notify_all, ExternalStore, Listener, Listeners, Subscription};
use crate::timer::TimerSlot;
use crate::transport::{Transport, TransportEvent};
use crate::visibility::Visibility;

/// Poll cadence and signal channel timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Interval between automatic fetches while visible.
    pub visible_interval: Duration,
    /// Interval between automatic fetches while hidden.
    pub hidden_interval: Duration,
    /// The signal channel is abandoned if it has not opened by then.
    pub signal_connect_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            visible_interval: Duration::from_secs(5),
            hidden_interval: Duration::from_secs(60),
            signal_connect_timeout: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn interval(&self, visibility: Visibility) -> Duration {
        match visibility {
            Visibility::Visible => self.visible_interval,
            Visibility::Hidden => self.hidden_interval,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FactoryStoreOptions {
    pub poll: PollConfig,
    /// Signal-only push endpoint. Without one the store only polls.
    pub signal_url: Option<String>,
}

/// Workspace list kept fresh by polling, with push-triggered refetches.
///
/// Starts with the first subscriber and stops with the last. Polling is the
/// guaranteed path; the signal channel only shortens the wait and is given
/// up for good after a failure. Clones share the same store.
#[derive(Clone)]
pub struct FactoryStore {
    shared: Arc<Shared>,
}

struct Shared {
    source: Arc<dyn WorkspaceSource>,
    transport: Arc<dyn Transport>,
    signal_url: Option<String>,
    poll: PollConfig,
    visibility: watch::Receiver<Visibility>,
    state: Mutex<FactoryState>,
}

struct FactoryState {
    snapshot: Arc<FactoryStateSnapshot>,
    listeners: Listeners,
    started: bool,
    destroyed: bool,
    fetch_in_flight: bool,
    /// Bumped on stop; fetches started under an older epoch are discarded.
    epoch: u64,
    visibility: Visibility,
    poll_timer: TimerSlot,
    signal_timeout: TimerSlot,
    signal: Option<SignalConnection>,
    signal_generation: u64,
    visibility_watch: Option<BackgroundTask>,
    /// Set before the first start; every spawn goes through it.
    runtime: Option<Handle>,
}

struct SignalConnection {
    generation: u64,
    opened: bool,
    reader: BackgroundTask,
}

struct BackgroundTask(AbortHandle);

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl FactoryState {
    fn publish(&mut self, snapshot: FactoryStateSnapshot) -> Vec<Listener> {
        self.snapshot = Arc::new(snapshot);
        self.listeners.to_vec()
    }

    fn is_current_signal(&self, generation: u64) -> bool {
        self.signal
            .as_ref()
            .is_some_and(|signal| signal.generation == generation)
    }
}

impl FactoryStore {
    pub fn new(
        source: Arc<dyn WorkspaceSource>,
        transport: Arc<dyn Transport>,
        visibility: watch::Receiver<Visibility>,
        options: FactoryStoreOptions,
    ) -> Self {
        let initial_visibility = *visibility.borrow();
        Self {
            shared: Arc::new(Shared {
                source,
                transport,
                signal_url: options.signal_url,
                poll: options.poll,
                visibility,
                state: Mutex::new(FactoryState {
                    snapshot: Arc::new(FactoryStateSnapshot::default()),
                    listeners: Listeners::default(),
                    started: false,
                    destroyed: false,
                    fetch_in_flight: false,
                    epoch: 0,
                    visibility: initial_visibility,
                    poll_timer: TimerSlot::default(),
                    signal_timeout: TimerSlot::default(),
                    signal: None,
                    signal_generation: 0,
                    visibility_watch: None,
                    runtime: Handle::try_current().ok(),
                }),
            }),
        }
    }

    pub fn workspaces(&self) -> Vec<WorkspaceEntry> {
        lock(&self.shared.state).snapshot.workspaces.clone()
    }

    pub fn fetch_status(&self) -> FetchStatus {
        lock(&self.shared.state).snapshot.fetch_status
    }

    pub fn is_started(&self) -> bool {
        lock(&self.shared.state).started
    }

    /// Whether the signal channel is currently held open.
    pub fn has_signal(&self) -> bool {
        lock(&self.shared.state).signal.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.state).listeners.len()
    }

    pub fn same_store(&self, other: &FactoryStore) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Fetch now unless a fetch is already running. Does nothing while stopped.
    pub fn refresh(&self) {
        let mut state = lock(&self.shared.state);
        let to_notify = self.shared.request_fetch(&mut state);
        drop(state);
        notify_all(to_notify);
    }

    /// Halt polling, close the signal channel and discard any fetch in flight.
    /// Listeners stay registered; the next new subscriber starts it again.
    pub fn stop(&self) {
        let mut state = lock(&self.shared.state);
        let to_notify = self.shared.halt(&mut state);
        drop(state);
        notify_all(to_notify);
    }

    /// Stop, drop every listener and reset the snapshot. Later `subscribe`
    /// calls are inert. Safe to call repeatedly.
    pub fn destroy(&self) {
        let mut state = lock(&self.shared.state);
        self.shared.halt(&mut state);
        state.listeners.clear();
        state.snapshot = Arc::new(FactoryStateSnapshot::default());
        if !state.destroyed {
            crate::log_debug!("Workspace store destroyed");
            state.destroyed = true;
        }
    }
}

impl ExternalStore for FactoryStore {
    type Snapshot = FactoryStateSnapshot;

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = lock(&self.shared.state);
        if state.destroyed {
            crate::log_debug!("subscribe on destroyed workspace store");
            return Subscription::inert();
        }

        let id = state.listeners.insert(Arc::new(listener));
        let to_notify = if state.started {
            Vec::new()
        } else {
            self.shared.start(&mut state)
        };
        drop(state);
        notify_all(to_notify);

        let shared = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.unsubscribe(id);
            }
        })
    }

    fn snapshot(&self) -> Arc<FactoryStateSnapshot> {
        lock(&self.shared.state).snapshot.clone()
    }
}

impl std::fmt::Debug for FactoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryStore")
            .field("signal_url", &self.shared.signal_url)
            .field("poll", &self.shared.poll)
            .finish_non_exhaustive()
    }
}

impl Shared {
    /// Begin polling. Without a tokio runtime the store stays idle until a
    /// later subscribe finds one.
    fn start(self: &Arc<Self>, state: &mut FactoryState) -> Vec<Listener> {
        let Some(runtime) = crate::runtime::resolve(&mut state.runtime) else {
            crate::log_warn!("No tokio runtime to poll workspaces on, staying idle");
            return Vec::new();
        };
        state.started = true;
        let mut visibility = self.visibility.clone();
        state.visibility = *visibility.borrow_and_update();
        crate::log_debug!("Workspace store starting ({:?})", state.visibility);

        let to_notify = self.request_fetch(state);
        self.schedule_poll(state);
        self.connect_signal(state);

        let watcher = runtime.spawn(watch_visibility(Arc::downgrade(self), visibility));
        state.visibility_watch = Some(BackgroundTask(watcher.abort_handle()));
        to_notify
    }

    fn halt(&self, state: &mut FactoryState) -> Vec<Listener> {
        if state.started {
            crate::log_debug!("Workspace store stopping");
        }
        state.started = false;
        state.poll_timer.cancel();
        state.signal_timeout.cancel();
        state.signal = None;
        state.visibility_watch = None;
        state.fetch_in_flight = false;
        state.epoch += 1;

        if state.snapshot.fetch_status == FetchStatus::Fetching {
            let next = state.snapshot.with_fetch_status(FetchStatus::Idle);
            state.publish(next)
        } else {
            Vec::new()
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = lock(&self.state);
        if state.listeners.remove(id) && state.listeners.is_empty() {
            self.halt(&mut state);
        }
    }

    /// Start a fetch unless one is already running.
    fn request_fetch(self: &Arc<Self>, state: &mut FactoryState) -> Vec<Listener> {
        if !state.started {
            return Vec::new();
        }
        if state.fetch_in_flight {
            crate::log_debug!("Workspace fetch already in flight, skipping");
            return Vec::new();
        }
        let Some(runtime) = state.runtime.clone() else {
            return Vec::new();
        };
        state.fetch_in_flight = true;
        let epoch = state.epoch;

        let shared = Arc::downgrade(self);
        let source = self.source.clone();
        runtime.spawn(async move {
            let result = source.fetch_workspaces().await;
            if let Some(shared) = shared.upgrade() {
                shared.finish_fetch(epoch, result);
            }
        });

        let next = state.snapshot.with_fetch_status(FetchStatus::Fetching);
        state.publish(next)
    }

    fn finish_fetch(&self, epoch: u64, result: Result<Vec<WorkspaceEntry>, ApiError>) {
        let mut state = lock(&self.state);
        if state.epoch != epoch || !state.started {
            crate::log_debug!("Discarding workspace fetch from a stopped cycle");
            return;
        }
        state.fetch_in_flight = false;

        let next = match result {
            Ok(workspaces) => FactoryStateSnapshot::fetched(workspaces, Utc::now()),
            Err(err) => {
                crate::log_warn!("Workspace fetch failed: {}", err);
                state.snapshot.failed(err.user_message())
            }
        };
        let to_notify = state.publish(next);
        drop(state);
        notify_all(to_notify);
    }

    fn schedule_poll(self: &Arc<Self>, state: &mut FactoryState) {
        let Some(runtime) = state.runtime.clone() else {
            return;
        };
        let delay = self.poll.interval(state.visibility);
        let shared = Arc::downgrade(self);
        state.poll_timer.schedule(&runtime, delay, move |timer_generation| {
            if let Some(shared) = shared.upgrade() {
                shared.fire_poll(timer_generation);
            }
        });
    }

    fn fire_poll(self: &Arc<Self>, timer_generation: u64) {
        let mut state = lock(&self.state);
        if !state.poll_timer.claim(timer_generation) || !state.started {
            return;
        }
        let to_notify = self.request_fetch(&mut state);
        self.schedule_poll(&mut state);
        drop(state);
        notify_all(to_notify);
    }

    fn visibility_changed(self: &Arc<Self>, visibility: Visibility) {
        let mut state = lock(&self.state);
        if !state.started || state.visibility == visibility {
            return;
        }
        state.visibility = visibility;
        crate::log_debug!("Visibility changed to {:?}", visibility);

        let to_notify = match visibility {
            Visibility::Visible => self.request_fetch(&mut state),
            Visibility::Hidden => Vec::new(),
        };
        self.schedule_poll(&mut state);
        drop(state);
        notify_all(to_notify);
    }

    fn connect_signal(self: &Arc<Self>, state: &mut FactoryState) {
        let Some(url) = self.signal_url.as_deref() else {
            return;
        };
        let Some(runtime) = state.runtime.clone() else {
            return;
        };
        state.signal_generation += 1;
        let generation = state.signal_generation;

        crate::log_debug!("Opening signal channel {}", url);
        let events = self.transport.connect(url);
        let reader = runtime.spawn(read_signal(Arc::downgrade(self), generation, events));
        state.signal = Some(SignalConnection {
            generation,
            opened: false,
            reader: BackgroundTask(reader.abort_handle()),
        });

        let shared = Arc::downgrade(self);
        state
            .signal_timeout
            .schedule(&runtime, self.poll.signal_connect_timeout, move |timer_generation| {
                if let Some(shared) = shared.upgrade() {
                    shared.fire_signal_timeout(generation, timer_generation);
                }
            });
    }

    fn fire_signal_timeout(&self, generation: u64, timer_generation: u64) {
        let mut state = lock(&self.state);
        if !state.signal_timeout.claim(timer_generation) || !state.is_current_signal(generation) {
            return;
        }
        if state.signal.as_ref().is_some_and(|signal| !signal.opened) {
            crate::log_warn!(
                "Signal channel did not open within {}ms, relying on polling",
                self.poll.signal_connect_timeout.as_millis()
            );
            state.signal = None;
        }
    }

    /// Apply one signal channel event. Returns false once the reader should stop.
    fn handle_signal_event(self: &Arc<Self>, generation: u64, event: TransportEvent) -> bool {
        let mut state = lock(&self.state);
        if !state.is_current_signal(generation) {
            return false;
        }

        let (keep_reading, to_notify) = match event {
            TransportEvent::Open => {
                crate::log_info!("Signal channel connected");
                state.signal_timeout.cancel();
                if let Some(signal) = state.signal.as_mut() {
                    signal.opened = true;
                }
                (true, Vec::new())
            }
            TransportEvent::Message(message) if message.event == RELOAD_EVENT => {
                crate::log_debug!("Reload signal received");
                (true, self.request_fetch(&mut state))
            }
            TransportEvent::Message(_) => (true, Vec::new()),
            TransportEvent::Error(err) => {
                self.abandon_signal(&mut state, &err);
                (false, Vec::new())
            }
        };

        drop(state);
        notify_all(to_notify);
        keep_reading
    }

    fn abandon_signal(&self, state: &mut FactoryState, err: &TransportError) {
        crate::log_warn!("Signal channel failed ({}), relying on polling", err);
        state.signal_timeout.cancel();
        state.signal = None;
    }
}

async fn read_signal(
    shared: Weak<Shared>,
    generation: u64,
    mut events: BoxStream<'static, TransportEvent>,
) {
    while let Some(event) = events.next().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.handle_signal_event(generation, event) {
            return;
        }
    }
    if let Some(shared) = shared.upgrade() {
        shared.handle_signal_event(generation, TransportEvent::Error(TransportError::Closed));
    }
}

async fn watch_visibility(shared: Weak<Shared>, mut visibility: watch::Receiver<Visibility>) {
    while visibility.changed().await.is_ok() {
        let current = *visibility.borrow_and_update();
        let Some(shared) = shared.upgrade() else {
            return;
        };
        shared.visibility_changed(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{names, settle, FakeSource, FakeTransport};
    use crate::visibility::visibility_channel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SIGNAL_URL: &str = "http://factory.test/api/workspaces/signal";

    struct Harness {
        store: FactoryStore,
        source: Arc<FakeSource>,
        transport: Arc<FakeTransport>,
        visibility: watch::Sender<Visibility>,
    }

    fn harness(source: Arc<FakeSource>) -> Harness {
        let transport = FakeTransport::new();
        let (visibility, receiver) = visibility_channel();
        let store = FactoryStore::new(
            source.clone(),
            transport.clone(),
            receiver,
            FactoryStoreOptions {
                poll: PollConfig::default(),
                signal_url: Some(SIGNAL_URL.to_string()),
            },
        );
        Harness {
            store,
            source,
            transport,
            visibility,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_subscriber_fetches_then_polls() {
        let h = harness(FakeSource::new());
        h.source.push_ok(&["alpha", "beta"]);
        assert_eq!(h.source.calls(), 0);

        let _sub = h.store.subscribe(|| {});
        settle().await;
        assert_eq!(h.source.calls(), 1);

        let snapshot = h.store.snapshot();
        assert_eq!(names(&snapshot.workspaces), vec!["alpha", "beta"]);
        assert_eq!(snapshot.fetch_status, FetchStatus::Idle);
        assert!(snapshot.last_fetched_at.is_some());

        tokio::time::advance(Duration::from_millis(4_999)).await;
        settle().await;
        assert_eq!(h.source.calls(), 1);
        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(h.source.calls(), 2);
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(h.source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_while_in_flight_are_skipped() {
        let h = harness(FakeSource::gated());
        h.source.push_ok(&["alpha"]);
        let _sub = h.store.subscribe(|| {});
        settle().await;
        assert!(h.store.snapshot().is_loading());

        h.store.refresh();
        h.store.refresh();
        settle().await;
        assert_eq!(h.source.calls(), 1);

        h.source.release(1);
        settle().await;
        assert_eq!(h.store.fetch_status(), FetchStatus::Idle);
        assert_eq!(names(&h.store.workspaces()), vec!["alpha"]);

        h.store.refresh();
        settle().await;
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn background_refresh_keeps_the_list_on_screen() {
        let h = harness(FakeSource::gated());
        h.source.push_ok(&["alpha"]);
        let _sub = h.store.subscribe(|| {});
        h.source.release(1);
        settle().await;

        h.store.refresh();
        settle().await;
        let refreshing = h.store.snapshot();
        assert_eq!(refreshing.fetch_status, FetchStatus::Fetching);
        assert_eq!(names(&refreshing.workspaces), vec!["alpha"]);
        assert!(!refreshing.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_previous_list_until_next_success() {
        let h = harness(FakeSource::new());
        h.source.push_ok(&["alpha", "beta"]);
        h.source.push_err(ApiError::Http {
            status: 500,
            body: "oops".to_string(),
        });
        h.source.push_ok(&["gamma"]);

        let _sub = h.store.subscribe(|| {});
        settle().await;
        let loaded_at = h.store.snapshot().last_fetched_at;

        h.store.refresh();
        settle().await;
        let failed = h.store.snapshot();
        assert_eq!(failed.fetch_status, FetchStatus::Error);
        assert_eq!(failed.last_error.as_deref(), Some("HTTP 500"));
        assert_eq!(names(&failed.workspaces), vec!["alpha", "beta"]);
        assert_eq!(failed.last_fetched_at, loaded_at);

        h.store.refresh();
        settle().await;
        let recovered = h.store.snapshot();
        assert_eq!(recovered.fetch_status, FetchStatus::Idle);
        assert!(recovered.last_error.is_none());
        assert_eq!(names(&recovered.workspaces), vec!["gamma"]);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_uses_long_interval_and_visible_fetches_immediately() {
        let h = harness(FakeSource::new());
        let _sub = h.store.subscribe(|| {});
        settle().await;
        assert_eq!(h.source.calls(), 1);

        h.visibility.send_replace(Visibility::Hidden);
        settle().await;
        assert_eq!(h.source.calls(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(h.source.calls(), 1);
        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(h.source.calls(), 2);

        h.visibility.send_replace(Visibility::Visible);
        settle().await;
        assert_eq!(h.source.calls(), 3);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(h.source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_hidden_polls_slowly() {
        let h = harness(FakeSource::new());
        h.visibility.send_replace(Visibility::Hidden);
        let _sub = h.store.subscribe(|| {});
        settle().await;
        assert_eq!(h.source.calls(), 1);

        tokio::time::advance(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(h.source.calls(), 1);
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_signal_triggers_a_fetch() {
        let h = harness(FakeSource::new());
        let _sub = h.store.subscribe(|| {});
        settle().await;
        assert_eq!(h.transport.connection_count(), 1);
        assert_eq!(h.transport.connection(0).url, SIGNAL_URL);

        let signal = h.transport.connection(0);
        signal.open();
        settle().await;
        assert!(h.store.has_signal());

        signal.message("reload", "");
        settle().await;
        assert_eq!(h.source.calls(), 2);

        signal.message("workspace:update", "{}");
        settle().await;
        assert_eq!(h.source.calls(), 2);

        // an opened channel outlives the connect timeout
        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;
        assert!(!signal.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn signal_connect_timeout_abandons_without_retry() {
        let h = harness(FakeSource::new());
        let _sub = h.store.subscribe(|| {});
        settle().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert!(h.transport.connection(0).is_closed());
        assert!(!h.store.has_signal());

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(h.transport.connection_count(), 1);
        // polling carries on regardless
        assert!(h.source.calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn signal_error_abandons_without_touching_polling() {
        let h = harness(FakeSource::new());
        let _sub = h.store.subscribe(|| {});
        h.transport.connection(0).open();
        settle().await;

        h.transport.connection(0).fail();
        settle().await;
        assert!(h.transport.connection(0).is_closed());
        assert!(!h.store.has_signal());
        assert!(h.store.is_started());

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(h.source.calls(), 2);
        assert_eq!(h.transport.connection_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_an_in_flight_fetch() {
        let h = harness(FakeSource::gated());
        h.source.push_ok(&["alpha"]);
        let _sub = h.store.subscribe(|| {});
        settle().await;
        assert_eq!(h.store.fetch_status(), FetchStatus::Fetching);

        h.store.stop();
        assert_eq!(h.store.fetch_status(), FetchStatus::Idle);
        h.source.release(1);
        settle().await;

        let snapshot = h.store.snapshot();
        assert!(snapshot.workspaces.is_empty());
        assert!(snapshot.last_fetched_at.is_none());
        assert!(h.transport.connection(0).is_closed());

        h.store.refresh();
        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(h.source.calls(), 1);

        h.store.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn last_unsubscribe_stops_and_next_subscriber_restarts() {
        let h = harness(FakeSource::new());
        let sub = h.store.subscribe(|| {});
        settle().await;
        sub.unsubscribe();
        settle().await;
        assert!(!h.store.is_started());
        assert!(h.transport.connection(0).is_closed());

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(h.source.calls(), 1);

        let _again = h.store.subscribe(|| {});
        settle().await;
        assert_eq!(h.source.calls(), 2);
        assert_eq!(h.transport.connection_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_hear_fetch_progress() {
        let h = harness(FakeSource::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _sub = h.store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        // fetching
        assert_eq!(count.load(Ordering::SeqCst), 1);
        settle().await;
        // idle with data
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscribe_outside_a_runtime_stays_idle() {
        let h = harness(FakeSource::new());
        let sub = h.store.subscribe(|| {});
        assert!(sub.is_active());
        assert!(!h.store.is_started());
        assert_eq!(h.store.fetch_status(), FetchStatus::Idle);

        h.store.refresh();
        h.store.stop();
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.transport.connection_count(), 0);

        // the next subscriber inside a runtime starts the cycle
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let _again = h.store.subscribe(|| {});
            settle().await;
            assert!(h.store.is_started());
            assert_eq!(h.source.calls(), 1);
            assert_eq!(h.transport.connection_count(), 1);
        });
        drop(sub);
    }

    #[tokio::test(start_paused = true)]
    async fn destroy_is_idempotent_and_makes_subscribe_inert() {
        let h = harness(FakeSource::new());
        h.source.push_ok(&["alpha"]);
        let _sub = h.store.subscribe(|| {});
        settle().await;

        h.store.destroy();
        h.store.destroy();
        settle().await;

        assert_eq!(*h.store.snapshot(), FactoryStateSnapshot::default());
        assert_eq!(h.store.subscriber_count(), 0);
        assert!(h.transport.connection(0).is_closed());

        let late = h.store.subscribe(|| {});
        assert!(!late.is_active());
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(h.source.calls(), 1);
    }
}
