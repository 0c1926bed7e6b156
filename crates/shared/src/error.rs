//! Error types for REST fetches and push transports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// RFC7807 Problem Details (application/problem+json)
///
/// The backend answers failed `/api/*` requests with this envelope, so a
/// failed fetch can carry the server's explanation instead of a raw body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type", default)]
    pub type_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Attempt to parse an RFC7807 (or RFC7807-ish) JSON body into a user-facing message.
/// Prefers `detail`, falls back to `title`.
pub fn try_problem_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ProblemDetails>(body).ok()?;
    if let Some(detail) = parsed.detail {
        if !detail.trim().is_empty() {
            return Some(detail);
        }
    }
    if !parsed.title.trim().is_empty() {
        return Some(parsed.title);
    }
    None
}

/// Failure of a REST request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl ApiError {
    /// Short text suitable for an error banner.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { status, body } => match try_problem_detail(body) {
                Some(detail) => format!("HTTP {status}: {detail}"),
                None => format!("HTTP {status}"),
            },
            other => other.to_string(),
        }
    }
}

/// Failure of a server-push connection.
///
/// These never cross a store's public API; they only drive
/// `ConnectionStatus` and the reconnect loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("stream body error: {0}")]
    Body(String),
    #[error("connection closed by server")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_detail_prefers_detail_then_title() {
        let body = r#"{"type":"about:blank","title":"Not Found","status":404,"detail":"no such workspace"}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("no such workspace"));

        let body = r#"{"type":"about:blank","title":"Forbidden","status":403}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("Forbidden"));

        assert_eq!(try_problem_detail("<html>oops</html>"), None);
    }

    #[test]
    fn user_message_hides_raw_bodies() {
        let err = ApiError::Http {
            status: 502,
            body: "<html>bad gateway</html>".to_string(),
        };
        assert_eq!(err.user_message(), "HTTP 502");

        let err = ApiError::Http {
            status: 500,
            body: r#"{"title":"Internal Server Error","status":500,"detail":"db down"}"#
                .to_string(),
        };
        assert_eq!(err.user_message(), "HTTP 500: db down");

        let err = ApiError::Network("connection refused".to_string());
        assert_eq!(err.user_message(), "Network error: connection refused");
    }
}
