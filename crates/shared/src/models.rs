//! Workspace list models returned by the REST polling endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A workspace in the factory list. Forks share the same shape.
///
/// Identity is by `name`, assumed unique within one response. Fields the
/// dashboard does not interpret are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceEntry {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub forks: Vec<WorkspaceEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkspaceEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            forks: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_fork(mut self, fork: WorkspaceEntry) -> Self {
        self.forks.push(fork);
        self
    }

    /// Look up `name` in this entry and its forks, depth-first.
    pub fn find(&self, name: &str) -> Option<&WorkspaceEntry> {
        self.walk().find(|entry| entry.name == name)
    }

    /// This entry followed by every descendant, depth-first.
    pub fn walk(&self) -> impl Iterator<Item = &WorkspaceEntry> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.forks.iter().rev());
            Some(next)
        })
    }

    /// Number of descendants at any depth.
    pub fn fork_count(&self) -> usize {
        self.walk().count() - 1
    }
}

/// Body of the workspace list endpoint. A `null` list means "none".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceListResponse {
    #[serde(default)]
    pub workspaces: Option<Vec<WorkspaceEntry>>,
}

impl WorkspaceListResponse {
    pub fn into_workspaces(self) -> Vec<WorkspaceEntry> {
        self.workspaces.unwrap_or_default()
    }
}

/// Search a whole list (roots and forks) by name.
pub fn find_workspace<'a>(list: &'a [WorkspaceEntry], name: &str) -> Option<&'a WorkspaceEntry> {
    list.iter().find_map(|root| root.find(name))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
