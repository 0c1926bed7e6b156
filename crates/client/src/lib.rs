//! Factory Client - real-time state sync layer
//!
//! Keeps local snapshots of backend state fresh for UI-style observers:
//!
//! - [`EventStreamStore`]: one server-push connection, last payload per
//!   event type, reconnect with exponential backoff.
//! - [`WorkspaceStreams`]: one isolated event stream per workspace id.
//! - [`FactoryStore`]: workspace list polled over REST on a
//!   visibility-dependent timer, refetched early on push `reload` signals.
//!
//! Every store implements [`ExternalStore`]: a cheap `snapshot()` plus a
//! `subscribe()` that returns a [`Subscription`] guard. Connections open with
//! the first subscriber and close with the last. Background work runs on the
//! tokio runtime the store was created or first subscribed in; with no
//! runtime available a store logs a warning and stays disconnected.

pub mod api_client;
pub mod config;
pub mod logging;
pub mod store;
pub mod store_watch;
pub mod stores;
pub mod stream;
pub mod transport;
pub mod visibility;

mod runtime;
mod timer;

#[cfg(test)]
mod test_support;

pub use api_client::{ApiClient, HttpWorkspaceSource, WorkspaceSource};
pub use config::{sync_config, SyncConfig};
pub use store::{ExternalStore, Listener, Subscription};
pub use store_watch::StoreWatch;
pub use stores::{
    default_factory_store, reset_default_factory_store, set_page_visibility, FactoryStore,
    FactoryStoreOptions, PollConfig,
};
pub use stream::{
    default_event_store, default_workspace_streams, reset_default_event_store,
    reset_default_workspace_streams, EventStreamOptions, EventStreamStore, ReconnectConfig,
    WorkspaceStreams,
};
pub use transport::{SseDecoder, SseMessage, SseTransport, Transport, TransportEvent};
pub use visibility::{visibility_channel, Visibility};
