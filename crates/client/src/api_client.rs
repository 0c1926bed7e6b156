//! HTTP API client for the factory backend's REST endpoints.

use async_trait::async_trait;
use factory_shared::{ApiError, WorkspaceEntry, WorkspaceListResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for making JSON API requests against one backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: String::new(),
        }
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reuse an existing reqwest client (connection pool, proxies, timeouts).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URLs pass through; anything else hangs off the base with
    /// exactly one slash between them.
    fn url(&self, path: &str) -> String {
        if path.contains("://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<TRes: DeserializeOwned>(&self, path: &str) -> Result<TRes, ApiError> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();

        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the hybrid store gets its workspace list from.
#[async_trait]
pub trait WorkspaceSource: Send + Sync {
    async fn fetch_workspaces(&self) -> Result<Vec<WorkspaceEntry>, ApiError>;
}

/// [`WorkspaceSource`] backed by `GET {base}/api/workspaces`.
#[derive(Debug, Clone)]
pub struct HttpWorkspaceSource {
    api: ApiClient,
    path: String,
}

impl HttpWorkspaceSource {
    pub const DEFAULT_PATH: &'static str = "/api/workspaces";

    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            path: Self::DEFAULT_PATH.to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

#[async_trait]
impl WorkspaceSource for HttpWorkspaceSource {
    async fn fetch_workspaces(&self) -> Result<Vec<WorkspaceEntry>, ApiError> {
        let response: WorkspaceListResponse =
            self.api.get_json(&self.path).await.inspect_err(|err| {
                if let ApiError::Deserialize(detail) = err {
                    crate::log_error!("Unexpected workspace list body: {}", detail);
                }
            })?;
        Ok(response.into_workspaces())
    }
}
