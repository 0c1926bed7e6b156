//! Typed event streams.
//!
//! [`EventStreamStore`] owns one push connection and keeps the last payload
//! of each [`EventType`](factory_shared::EventType). [`WorkspaceStreams`]
//! hands out one isolated store per workspace id.

mod backoff;
mod registry;
mod store;

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

pub use backoff::ReconnectConfig;
pub use registry::WorkspaceStreams;
pub use store::{EventStreamOptions, EventStreamStore};

use crate::config::sync_config;
use crate::store::lock;
use crate::transport::default_transport;

static DEFAULT_EVENT_STORE: Lazy<Mutex<Option<EventStreamStore>>> = Lazy::new(|| Mutex::new(None));

static DEFAULT_WORKSPACE_STREAMS: Lazy<Mutex<Option<Arc<WorkspaceStreams>>>> =
    Lazy::new(|| Mutex::new(None));

fn default_options() -> EventStreamOptions {
    EventStreamOptions {
        reconnect: sync_config().reconnect,
        ..EventStreamOptions::default()
    }
}

/// Process-wide store for the global event stream, built on first use.
pub fn default_event_store() -> EventStreamStore {
    lock(&DEFAULT_EVENT_STORE)
        .get_or_insert_with(|| {
            EventStreamStore::new(sync_config().events_url(), default_transport(), default_options())
        })
        .clone()
}

/// Destroy the global event store. The next call to
/// [`default_event_store`] builds a fresh one.
pub fn reset_default_event_store() {
    let store = lock(&DEFAULT_EVENT_STORE).take();
    if let Some(store) = store {
        store.destroy();
    }
}

/// Process-wide registry of per-workspace streams.
pub fn default_workspace_streams() -> Arc<WorkspaceStreams> {
    lock(&DEFAULT_WORKSPACE_STREAMS)
        .get_or_insert_with(|| {
            Arc::new(WorkspaceStreams::new(
                sync_config().base_url.clone(),
                default_transport(),
                default_options(),
            ))
        })
        .clone()
}

/// Destroy every per-workspace stream and drop the registry.
pub fn reset_default_workspace_streams() {
    let streams = lock(&DEFAULT_WORKSPACE_STREAMS).take();
    if let Some(streams) = streams {
        streams.reset_all();
    }
}
