//! GitHub REST client.
//!
//! [`GitHubClient`] implements [`RepositorySource`](crate::platform::RepositorySource)
//! over an [`HttpTransport`](crate::http::HttpTransport), paginating list
//! endpoints and retrying rate-limited or dropped requests.

mod client;
mod convert;
mod error;
mod types;

pub use client::{GITHUB_API_URL, GitHubClient};
pub use error::{GitHubError, is_retryable, short_error_message};
