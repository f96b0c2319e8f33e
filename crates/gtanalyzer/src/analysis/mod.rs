//! The asynchronous analysis engine.
//!
//! A [`Dispatcher`] validates a [`BatchRequest`], registers it in a shared
//! [`ProgressStore`](crate::store::ProgressStore) and spawns one worker that
//! analyzes the entities in order. Each outcome is recorded as soon as it is
//! known; a [`ResultPoller`] reads whatever has landed so far.
//!
//! Analyzers are pluggable through [`EntityAnalyzer`]:
//! [`RepositoryAnalyzer`] for repositories and [`BoardAnalyzer`] for boards.

mod board;
mod dispatcher;
mod poller;
mod progress;
mod repository;
mod types;
mod worker;

pub use board::{
    BoardAnalyzer, BoardReport, MilestoneReport, MilestoneSummary, TaskReport, UserStoryReport,
};
pub use dispatcher::{Dispatcher, validate};
pub use poller::ResultPoller;
pub use progress::{AnalysisProgress, ProgressCallback, emit};
pub use repository::{CollaboratorActivity, CommitRecord, RepositoryAnalyzer, RepositoryReport};
pub use types::{
    AnalysisParams, BatchRequest, DispatchAck, DispatchError, EntityAnalyzer, EntityRef,
    EntityResult, FailureDocument, RequestId,
};
pub use worker::{AnalysisHandle, CANCELLED_ERROR, WorkerReport, WorkerState};
