use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by an upstream data source (GitHub, Taiga).
///
/// Analyzers never propagate these past the entity boundary: they are turned
/// into failure documents carrying [`UpstreamError::reason`].
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Non-success response from the upstream API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded{}", reset_suffix(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Credentials missing or rejected.
    #[error("Authentication required")]
    AuthRequired,

    /// Resource not found (repository, board, commit, ...).
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network, connection or timeout failure.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Response body did not match the expected shape.
    #[error("Decode error: {message}")]
    Decode { message: String },
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(". Resets at {at}"),
        None => String::new(),
    }
}

impl UpstreamError {
    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a rate-limit error with no known reset time.
    #[inline]
    pub fn rate_limited() -> Self {
        Self::RateLimited { reset_at: None }
    }

    /// Create a not found error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Check if this error is a rate limit error (retryable).
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Short reason stored in failure documents.
    pub fn reason(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::RateLimited { .. } => "rate limited".to_string(),
            Self::AuthRequired => "authentication required".to_string(),
            Self::NotFound { resource } => format!("not found: {resource}"),
            Self::Network { message } => message.clone(),
            Self::Decode { message } => format!("unexpected response: {message}"),
        }
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps multi-line upstream
/// bodies out of progress output.
///
/// # Example
///
/// ```ignore
/// use gtanalyzer::platform::short_error_message;
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// assert_eq!(short_error_message(&error), "file not found");
/// ```
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for upstream operations.
pub type Result<T> = std::result::Result<T, UpstreamError>;
