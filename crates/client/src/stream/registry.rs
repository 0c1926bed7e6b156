//! Per-workspace event streams.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::store::{EventStreamOptions, EventStreamStore};
use crate::store::lock;
use crate::transport::Transport;

/// Lazily built map of workspace id -> its own [`EventStreamStore`].
///
/// Each workspace detail view gets an isolated channel. Stores are never
/// shared across ids.
pub struct WorkspaceStreams {
    base_url: String,
    transport: Arc<dyn Transport>,
    options: EventStreamOptions,
    stores: Mutex<HashMap<String, EventStreamStore>>,
}

impl WorkspaceStreams {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        options: EventStreamOptions,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            options,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Event stream URL for a workspace.
    pub fn url_for(&self, workspace_id: &str) -> String {
        format!(
            "{}/api/workspaces/{}/events",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(workspace_id)
        )
    }

    /// The store for `workspace_id`, built on first access.
    pub fn get(&self, workspace_id: &str) -> EventStreamStore {
        let mut stores = lock(&self.stores);
        stores
            .entry(workspace_id.to_string())
            .or_insert_with(|| {
                crate::log_debug!("Creating event stream for workspace {}", workspace_id);
                EventStreamStore::new(
                    self.url_for(workspace_id),
                    self.transport.clone(),
                    self.options.clone(),
                )
            })
            .clone()
    }

    pub fn contains(&self, workspace_id: &str) -> bool {
        lock(&self.stores).contains_key(workspace_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.stores).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.stores).is_empty()
    }

    /// Destroy every store and forget them. Later `get`s build fresh ones.
    pub fn reset_all(&self) {
        let drained: Vec<EventStreamStore> = lock(&self.stores).drain().map(|(_, s)| s).collect();
        if !drained.is_empty() {
            crate::log_info!("Resetting {} workspace event stream(s)", drained.len());
        }
        for store in drained {
            store.destroy();
        }
    }
}

impl std::fmt::Debug for WorkspaceStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceStreams")
            .field("base_url", &self.base_url)
            .field("stores", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ExternalStore;
    use crate::test_support::{settle, FakeTransport};
    use factory_shared::{EventType, StreamSnapshot};
    use serde_json::json;

    fn registry(transport: &Arc<FakeTransport>) -> WorkspaceStreams {
        WorkspaceStreams::new(
            "http://factory.test/",
            transport.clone(),
            EventStreamOptions::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_same_store_different_keys_isolated() {
        let transport = FakeTransport::new();
        let streams = registry(&transport);

        let a1 = streams.get("ws-a");
        let a2 = streams.get("ws-a");
        let b = streams.get("ws-b");
        assert!(a1.same_store(&a2));
        assert!(!a1.same_store(&b));
        assert_eq!(streams.len(), 2);

        assert_eq!(a1.url(), "http://factory.test/api/workspaces/ws-a/events");
        assert_eq!(
            streams.url_for("team/one two"),
            "http://factory.test/api/workspaces/team%2Fone%20two/events"
        );

        let _sub_a = a1.subscribe(|| {});
        let _sub_b = b.subscribe(|| {});
        transport.connection(0).open();
        transport.connection(0).message("messages:new", r#"{"id":1}"#);
        settle().await;

        assert_eq!(a2.payload(EventType::MessagesNew), Some(json!({"id": 1})));
        assert!(b.payload(EventType::MessagesNew).is_none());
        assert_eq!(transport.connection(1).url, b.url());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_all_destroys_and_rebuilds() {
        let transport = FakeTransport::new();
        let streams = registry(&transport);

        let old = streams.get("ws-a");
        let _sub = old.subscribe(|| {});
        transport.connection(0).open();
        transport.connection(0).message("todos:update", "[]");
        settle().await;

        streams.reset_all();
        settle().await;
        assert!(streams.is_empty());
        assert!(transport.connection(0).is_closed());

        let fresh = streams.get("ws-a");
        assert!(!fresh.same_store(&old));
        assert_eq!(*fresh.snapshot(), StreamSnapshot::default());
        assert_eq!(*old.snapshot(), StreamSnapshot::default());

        streams.reset_all();
        streams.reset_all();
        assert!(!streams.contains("ws-a"));
    }
}
