//! Sync layer configuration from environment variables.

use std::time::Duration;

use once_cell::sync::Lazy;
use url::Url;

use crate::stores::PollConfig;
use crate::stream::ReconnectConfig;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

static SYNC_CONFIG: Lazy<SyncConfig> = Lazy::new(|| {
    let config = SyncConfig::from_env();
    crate::log_info!("Factory sync layer using {}", config.base_url);
    config
});

/// Configuration read once from the environment for the default stores.
pub fn sync_config() -> &'static SyncConfig {
    &SYNC_CONFIG
}

/// Endpoints and timings shared by the default stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backend origin, without a trailing slash.
    pub base_url: String,
    pub reconnect: ReconnectConfig,
    pub poll: PollConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Parse the configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FACTORY_BASE_URL`: backend origin (default: "http://localhost:8080")
    /// - `FACTORY_RECONNECT_FLOOR_MS` / `FACTORY_RECONNECT_CEILING_MS`: backoff bounds (default: 1000 / 30000)
    /// - `FACTORY_POLL_VISIBLE_MS` / `FACTORY_POLL_HIDDEN_MS`: poll intervals (default: 5000 / 60000)
    /// - `FACTORY_SIGNAL_TIMEOUT_MS`: how long the reload channel may take to open (default: 5000)
    ///
    /// Unparsable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let base_url = match lookup("FACTORY_BASE_URL") {
            Some(raw) => parse_base_url(&raw).unwrap_or_else(|| {
                crate::log_warn!(
                    "FACTORY_BASE_URL '{}' is not an http(s) URL, using {}",
                    raw,
                    DEFAULT_BASE_URL
                );
                defaults.base_url.clone()
            }),
            None => defaults.base_url.clone(),
        };

        let millis = |key: &str, default: Duration| -> Duration {
            let Some(raw) = lookup(key) else {
                return default;
            };
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    crate::log_warn!("{} '{}' is not a positive number of milliseconds", key, raw);
                    default
                }
            }
        };

        let reconnect = ReconnectConfig {
            initial_delay: millis("FACTORY_RECONNECT_FLOOR_MS", defaults.reconnect.initial_delay),
            max_delay: millis("FACTORY_RECONNECT_CEILING_MS", defaults.reconnect.max_delay),
        };
        let poll = PollConfig {
            visible_interval: millis("FACTORY_POLL_VISIBLE_MS", defaults.poll.visible_interval),
            hidden_interval: millis("FACTORY_POLL_HIDDEN_MS", defaults.poll.hidden_interval),
            signal_connect_timeout: millis(
                "FACTORY_SIGNAL_TIMEOUT_MS",
                defaults.poll.signal_connect_timeout,
            ),
        };

        Self {
            base_url,
            reconnect,
            poll,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Global typed event stream.
    pub fn events_url(&self) -> String {
        self.endpoint("/api/events")
    }

    /// Workspace list REST endpoint.
    pub fn workspaces_url(&self) -> String {
        self.endpoint("/api/workspaces")
    }

    /// Signal-only channel whose `reload` events trigger a list refetch.
    pub fn signal_url(&self) -> String {
        self.endpoint("/api/workspaces/signal")
    }

    pub fn workspace_events_url(&self, workspace_id: &str) -> String {
        self.endpoint(&format!(
            "/api/workspaces/{}/events",
            urlencoding::encode(workspace_id)
        ))
    }
}

fn parse_base_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(url.as_str().trim_end_matches('/').to_string())
}
