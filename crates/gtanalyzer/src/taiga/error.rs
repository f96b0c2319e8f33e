//! Error types for Taiga API operations.

use thiserror::Error;

use crate::http::HttpError;
use crate::platform::UpstreamError;

#[derive(Debug, Error)]
pub enum TaigaError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Taiga answers throttled requests with 429 and no reset header.
    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<HttpError> for TaigaError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Timeout(msg) => TaigaError::Timeout(msg),
            other => TaigaError::Http(other.to_string()),
        }
    }
}

impl From<TaigaError> for UpstreamError {
    fn from(err: TaigaError) -> Self {
        match err {
            TaigaError::Http(message)
            | TaigaError::Timeout(message)
            | TaigaError::Config(message) => UpstreamError::Network { message },
            TaigaError::Json(e) => UpstreamError::decode(e.to_string()),
            TaigaError::Api { status, message } => match status {
                401 | 403 => UpstreamError::AuthRequired,
                404 => UpstreamError::NotFound { resource: message },
                _ => UpstreamError::Api { status, message },
            },
            TaigaError::RateLimited => UpstreamError::rate_limited(),
        }
    }
}

/// Rate limits, gateway errors and transport failures are retried.
pub fn is_retryable(err: &TaigaError) -> bool {
    match err {
        TaigaError::RateLimited | TaigaError::Http(_) | TaigaError::Timeout(_) => true,
        TaigaError::Api { status, .. } => matches!(status, 502 | 503 | 504),
        _ => false,
    }
}

pub fn short_error_message(err: &TaigaError) -> String {
    match err {
        TaigaError::Http(_) => "Network error".to_string(),
        TaigaError::Timeout(_) => "Timed out".to_string(),
        TaigaError::Json(_) => "JSON parse error".to_string(),
        TaigaError::Api { status, .. } => format!("HTTP {status}"),
        TaigaError::RateLimited => "Rate limited".to_string(),
        TaigaError::Config(msg) => format!("Config: {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_mapping() {
        let missing: UpstreamError = TaigaError::Api {
            status: 404,
            message: "No Project matches the given query.".to_string(),
        }
        .into();
        assert_eq!(missing.reason(), "not found: No Project matches the given query.");

        let limited: UpstreamError = TaigaError::RateLimited.into();
        assert!(limited.is_rate_limited());

        let auth: UpstreamError = TaigaError::Api {
            status: 401,
            message: String::new(),
        }
        .into();
        assert!(matches!(auth, UpstreamError::AuthRequired));
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(is_retryable(&TaigaError::RateLimited));
        assert!(is_retryable(&TaigaError::Http("reset".to_string())));
        assert!(is_retryable(&TaigaError::Api {
            status: 502,
            message: String::new()
        }));
        assert!(!is_retryable(&TaigaError::Api {
            status: 400,
            message: String::new()
        }));
        assert_eq!(short_error_message(&TaigaError::Timeout("t".into())), "Timed out");
    }
}
