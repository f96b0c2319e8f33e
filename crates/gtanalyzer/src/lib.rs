//! gtanalyzer - contribution analysis for GitHub repositories and Taiga boards.
//!
//! The library walks a batch of repositories or project boards in the
//! background, merges multi-stage upstream data per entity, and records each
//! outcome in a request-scoped store that callers poll independently.
//!
//! # Features
//!
//! - `github` - GitHub REST client and the repository analyzer.
//! - `taiga` - Taiga REST client and the board analyzer.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gtanalyzer::analysis::{AnalysisParams, BatchRequest, Dispatcher, EntityRef, RepositoryAnalyzer};
//! use gtanalyzer::github::GitHubClient;
//! use gtanalyzer::store::ProgressStore;
//!
//! let store = Arc::new(ProgressStore::new(std::time::Duration::from_secs(3600)));
//! let client = GitHubClient::new(Some(&token), std::time::Duration::from_secs(30))?;
//! let dispatcher = Dispatcher::new(Arc::new(RepositoryAnalyzer::new(client)), Arc::clone(&store));
//!
//! let batch = BatchRequest::new(
//!     vec![EntityRef::new("repoA"), EntityRef::new("repoB")],
//!     AnalysisParams::for_owner("my-org"),
//! );
//! let (ack, handle) = dispatcher.dispatch(batch)?;
//! let report = handle.wait().await;
//! let snapshot = store.snapshot(&ack.request_id)?;
//! ```

pub mod analysis;
pub mod http;
pub mod platform;
pub mod retry;
pub mod store;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "taiga")]
pub mod taiga;

pub use analysis::{
    AnalysisHandle, AnalysisParams, AnalysisProgress, BatchRequest, DispatchAck, DispatchError,
    Dispatcher, EntityAnalyzer, EntityRef, EntityResult, FailureDocument, ProgressCallback,
    RequestId, ResultPoller, WorkerReport, WorkerState,
};
pub use platform::{ApiRateLimiter, UpstreamError, rate_limits};
pub use store::{ProgressStore, Snapshot, StoreError};
