//! Typed event stream store: one push connection, last payload per type.

use std::sync::{Arc, Mutex, Weak};

use factory_shared::{ConnectionStatus, EventType, StreamEvent, StreamSnapshot, TransportError};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use super::backoff::{Backoff, ReconnectConfig};
use crate::store::{lock, notify_all, ExternalStore, Listener, Listeners, Subscription};
use crate::timer::TimerSlot;
use crate::transport::{Transport, TransportEvent};

#[derive(Debug, Clone)]
pub struct EventStreamOptions {
    pub reconnect: ReconnectConfig,
    /// Event names to demultiplex. Anything else on the wire is ignored.
    pub event_types: Vec<EventType>,
}

impl Default for EventStreamOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            event_types: EventType::ALL.to_vec(),
        }
    }
}

/// Store wrapping a single server-push connection to `url`.
///
/// The connection opens with the first subscriber and closes with the last.
/// While subscribed, drops are retried forever with exponential backoff.
/// Clones share the same store.
#[derive(Clone)]
pub struct EventStreamStore {
    shared: Arc<Shared>,
}

struct Shared {
    url: String,
    transport: Arc<dyn Transport>,
    event_types: Vec<EventType>,
    state: Mutex<StreamState>,
}

struct StreamState {
    snapshot: Arc<StreamSnapshot>,
    listeners: Listeners,
    connection: Option<Connection>,
    generation: u64,
    reconnect_timer: TimerSlot,
    backoff: Backoff,
    /// Where the reader and reconnect timer run. Found lazily on first connect.
    runtime: Option<Handle>,
    destroyed: bool,
}

/// A live transport. Dropping it stops the reader task, which drops the stream.
struct Connection {
    generation: u64,
    reader: AbortHandle,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl StreamState {
    fn publish(&mut self, snapshot: StreamSnapshot) -> Vec<Listener> {
        self.snapshot = Arc::new(snapshot);
        self.listeners.to_vec()
    }

    fn publish_status(&mut self, status: ConnectionStatus) -> Vec<Listener> {
        if self.snapshot.connection_status == status {
            return Vec::new();
        }
        let next = self.snapshot.with_status(status);
        self.publish(next)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.generation == generation)
    }
}

impl EventStreamStore {
    pub fn new(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        options: EventStreamOptions,
    ) -> Self {
        let snapshot = StreamSnapshot::initial(&options.event_types);
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                transport,
                event_types: options.event_types,
                state: Mutex::new(StreamState {
                    snapshot: Arc::new(snapshot),
                    listeners: Listeners::default(),
                    connection: None,
                    generation: 0,
                    reconnect_timer: TimerSlot::default(),
                    backoff: Backoff::new(options.reconnect),
                    runtime: Handle::try_current().ok(),
                    destroyed: false,
                }),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        lock(&self.shared.state).snapshot.connection_status
    }

    /// Latest payload received for `event_type`.
    pub fn payload(&self, event_type: EventType) -> Option<Value> {
        lock(&self.shared.state)
            .snapshot
            .payload(event_type)
            .cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.state).listeners.len()
    }

    /// Whether both handles point at the same store.
    pub fn same_store(&self, other: &EventStreamStore) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Close the connection, cancel timers, drop every listener and reset the
    /// snapshot. Later `subscribe` calls are inert. Safe to call repeatedly.
    pub fn destroy(&self) {
        let mut state = lock(&self.shared.state);
        self.shared.teardown(&mut state);
        state.listeners.clear();
        state.snapshot = Arc::new(StreamSnapshot::initial(&self.shared.event_types));
        if !state.destroyed {
            crate::log_debug!("Event stream {} destroyed", self.shared.url);
            state.destroyed = true;
        }
    }
}

impl ExternalStore for EventStreamStore {
    type Snapshot = StreamSnapshot;

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut state = lock(&self.shared.state);
        if state.destroyed {
            crate::log_debug!("subscribe on destroyed event stream {}", self.shared.url);
            return Subscription::inert();
        }

        let id = state.listeners.insert(Arc::new(listener));
        let to_notify = if state.connection.is_none() && !state.reconnect_timer.is_pending() {
            self.shared.connect(&mut state)
        } else {
            Vec::new()
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

    fn snapshot(&self) -> Arc<StreamSnapshot> {
        lock(&self.shared.state).snapshot.clone()
    }
}

impl std::fmt::Debug for EventStreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamStore")
            .field("url", &self.shared.url)
            .finish_non_exhaustive()
    }
}

impl Shared {
    /// Open a fresh transport, replacing any previous one. Without a tokio
    /// runtime the store stays disconnected until a later subscribe finds one.
    fn connect(self: &Arc<Self>, state: &mut StreamState) -> Vec<Listener> {
        let Some(runtime) = crate::runtime::resolve(&mut state.runtime) else {
            crate::log_warn!("No tokio runtime to connect {} on, staying disconnected", self.url);
            return Vec::new();
        };
        state.reconnect_timer.cancel();
        state.connection = None;
        state.generation += 1;
        let generation = state.generation;

        crate::log_debug!("Connecting to {} (generation {})", self.url, generation);
        let events = self.transport.connect(&self.url);
        let reader = runtime.spawn(read_connection(Arc::downgrade(self), generation, events));
        state.connection = Some(Connection {
            generation,
            reader: reader.abort_handle(),
        });
        state.publish_status(ConnectionStatus::Reconnecting)
    }

    /// Apply one transport event. Returns false once the reader should stop.
    fn handle_event(self: &Arc<Self>, generation: u64, event: TransportEvent) -> bool {
        let mut state = lock(&self.state);
        if !state.is_current(generation) {
            return false;
        }

        let (keep_reading, to_notify) = match event {
            TransportEvent::Open => {
                crate::log_info!("Event stream connected to {}", self.url);
                state.backoff.reset();
                (true, state.publish_status(ConnectionStatus::Connected))
            }
            TransportEvent::Message(message) => {
                let event_type = EventType::from_wire(&message.event)
                    .filter(|ty| self.event_types.contains(ty));
                match event_type {
                    Some(event_type) => {
                        let event = StreamEvent::from_raw(event_type, &message.data);
                        let next = state.snapshot.with_event(event);
                        (true, state.publish(next))
                    }
                    None => {
                        crate::log_debug!("Ignoring '{}' event on {}", message.event, self.url);
                        (true, Vec::new())
                    }
                }
            }
            TransportEvent::Error(err) => (false, self.handle_drop(&mut state, &err)),
        };

        drop(state);
        notify_all(to_notify);
        keep_reading
    }

    fn handle_drop(self: &Arc<Self>, state: &mut StreamState, err: &TransportError) -> Vec<Listener> {
        crate::log_warn!("Event stream {} dropped: {}", self.url, err);
        state.connection = None;
        let to_notify = state.publish_status(ConnectionStatus::Disconnected);
        self.schedule_reconnect(state);
        to_notify
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut StreamState) {
        if state.destroyed || state.listeners.is_empty() {
            return;
        }
        let Some(runtime) = crate::runtime::resolve(&mut state.runtime) else {
            return;
        };
        let delay = state.backoff.next_delay();
        crate::log_info!("Reconnecting to {} in {}ms", self.url, delay.as_millis());

        let shared = Arc::downgrade(self);
        state.reconnect_timer.schedule(&runtime, delay, move |timer_generation| {
            if let Some(shared) = shared.upgrade() {
                shared.fire_reconnect(timer_generation);
            }
        });
    }

    fn fire_reconnect(self: &Arc<Self>, timer_generation: u64) {
        let mut state = lock(&self.state);
        if !state.reconnect_timer.claim(timer_generation)
            || state.destroyed
            || state.listeners.is_empty()
        {
            return;
        }
        let to_notify = self.connect(&mut state);
        drop(state);
        notify_all(to_notify);
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = lock(&self.state);
        if state.listeners.remove(id) && state.listeners.is_empty() {
            self.teardown(&mut state);
        }
    }

    /// Close the transport and cancel the reconnect timer.
    fn teardown(&self, state: &mut StreamState) {
        if state.connection.take().is_some() {
            crate::log_debug!("Closing event stream {}", self.url);
        }
        state.reconnect_timer.cancel();
        state.backoff.reset();
        if state.snapshot.connection_status != ConnectionStatus::Disconnected {
            state.snapshot = Arc::new(state.snapshot.with_status(ConnectionStatus::Disconnected));
        }
    }
}

async fn read_connection(
    shared: Weak<Shared>,
    generation: u64,
    mut events: BoxStream<'static, TransportEvent>,
) {
    while let Some(event) = events.next().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.handle_event(generation, event) {
            return;
        }
    }
    // A stream that simply ends is a dropped connection too.
    if let Some(shared) = shared.upgrade() {
        shared.handle_event(generation, TransportEvent::Error(TransportError::Closed));
    }
}
