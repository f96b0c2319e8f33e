//! Upstream data-source boundary shared by both backends.
//!
//! This module defines the [`RepositorySource`] and [`BoardSource`] traits the
//! analyzers are written against, the records they return, and the common
//! error and pacing types used by the concrete clients.
//!
//! # Example
//!
//! ```ignore
//! use gtanalyzer::platform::{RepositorySource, UpstreamError};
//!
//! async fn branch_count<S: RepositorySource>(source: &S) -> Result<usize, UpstreamError> {
//!     Ok(source.list_branches("rust-lang", "rust").await?.len())
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{Result, UpstreamError, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};
pub use types::{
    BoardMember, BoardProject, BoardSource, BoardTask, Commit, CommitStats, DateWindow,
    HistoryEvent, Milestone, MilestoneDetails, PullRequest, PullRequestDetail, RepositorySource,
    UserStory,
};
