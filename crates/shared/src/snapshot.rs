//! Immutable snapshot values published by the client stores.
//!
//! Stores hand these out behind `Arc`; a change always publishes a new
//! value, so `Arc::ptr_eq` tells an observer whether anything moved.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::WorkspaceEntry;
use crate::protocol::{ConnectionStatus, EventType, StreamEvent};

/// Observable state of a typed event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub connection_status: ConnectionStatus,
    pub last_event: Option<StreamEvent>,
    /// Last payload per listened type. `None` until the first event of that type.
    pub events: BTreeMap<EventType, Option<Value>>,
}

impl StreamSnapshot {
    /// Disconnected, no events, every listened type unseen.
    pub fn initial(event_types: &[EventType]) -> Self {
        Self {
            connection_status: ConnectionStatus::Disconnected,
            last_event: None,
            events: event_types.iter().map(|ty| (*ty, None)).collect(),
        }
    }

    pub fn with_status(&self, connection_status: ConnectionStatus) -> Self {
        Self {
            connection_status,
            ..self.clone()
        }
    }

    /// Copy with `event` recorded as the latest payload of its type.
    pub fn with_event(&self, event: StreamEvent) -> Self {
        let mut events = self.events.clone();
        events.insert(event.event_type, Some(event.data.clone()));
        Self {
            connection_status: self.connection_status,
            last_event: Some(event),
            events,
        }
    }

    /// Latest payload for `event_type`, if one has arrived.
    pub fn payload(&self, event_type: EventType) -> Option<&Value> {
        self.events.get(&event_type)?.as_ref()
    }
}

impl Default for StreamSnapshot {
    fn default() -> Self {
        Self::initial(&EventType::ALL)
    }
}

/// Progress of the workspace list refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
    Error,
}

/// Observable state of the workspace list store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactoryStateSnapshot {
    pub workspaces: Vec<WorkspaceEntry>,
    pub fetch_status: FetchStatus,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Display text of the most recent failed fetch; cleared on success.
    pub last_error: Option<String>,
}

impl FactoryStateSnapshot {
    /// True only for the very first load. Background refreshes keep the
    /// previous list on screen instead.
    pub fn is_loading(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching && self.last_fetched_at.is_none()
    }

    pub fn with_fetch_status(&self, fetch_status: FetchStatus) -> Self {
        Self {
            fetch_status,
            ..self.clone()
        }
    }

    /// A successful fetch: the list is replaced wholesale.
    pub fn fetched(workspaces: Vec<WorkspaceEntry>, at: DateTime<Utc>) -> Self {
        Self {
            workspaces,
            fetch_status: FetchStatus::Idle,
            last_fetched_at: Some(at),
            last_error: None,
        }
    }

    /// A failed fetch: previous workspaces stay.
    pub fn failed(&self, error: String) -> Self {
        Self {
            fetch_status: FetchStatus::Error,
            last_error: Some(error),
            ..self.clone()
        }
    }
}
