//! Error types for GitHub API operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpError;
use crate::platform::UpstreamError;

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Transport-level failure (connection refused, TLS, DNS ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Primary or secondary rate limit hit.
    #[error("Rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<HttpError> for GitHubError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(msg) => GitHubError::Timeout(msg),
            other => GitHubError::Http(other.to_string()),
        }
    }
}

impl From<GitHubError> for UpstreamError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http(message) | GitHubError::Timeout(message) => {
                UpstreamError::Network { message }
            }
            GitHubError::Json(e) => UpstreamError::decode(e.to_string()),
            GitHubError::Api { status, message } => match status {
                401 | 403 => UpstreamError::AuthRequired,
                404 => UpstreamError::NotFound { resource: message },
                429 => UpstreamError::rate_limited(),
                _ => UpstreamError::Api { status, message },
            },
            GitHubError::RateLimited { reset_at } => UpstreamError::RateLimited { reset_at },
            GitHubError::Config(message) => UpstreamError::Network { message },
        }
    }
}

/// Check if an error is worth retrying: rate limits, gateway errors and
/// transport failures.
pub fn is_retryable(err: &GitHubError) -> bool {
    match err {
        GitHubError::RateLimited { .. } | GitHubError::Http(_) | GitHubError::Timeout(_) => true,
        GitHubError::Api { status, .. } => matches!(status, 429 | 502 | 503 | 504),
        _ => false,
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &GitHubError) -> String {
    match err {
        GitHubError::Http(_) => "Network error".to_string(),
        GitHubError::Timeout(_) => "Timed out".to_string(),
        GitHubError::Json(_) => "JSON parse error".to_string(),
        GitHubError::Api { status, message } => {
            if message.len() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {}: {}...", status, truncated)
            } else {
                format!("HTTP {}: {}", status, message)
            }
        }
        GitHubError::RateLimited { .. } => "Rate limited".to_string(),
        GitHubError::Config(msg) => format!("Config: {}", msg),
    }
}
