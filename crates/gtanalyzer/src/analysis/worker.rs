//! Background worker draining one batch, and the handle callers hold on it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinHandle;

use super::progress::{AnalysisProgress, ProgressCallback, emit};
use super::types::{BatchRequest, EntityAnalyzer, EntityResult, FailureDocument, RequestId};
use crate::store::ProgressStore;

/// Error recorded for entities skipped after cancellation.
pub const CANCELLED_ERROR: &str = "analysis cancelled";

/// Lifecycle of a worker: `Idle -> Running -> Drained | Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Drained,
    Cancelled,
}

/// Summary returned when a worker finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[must_use]
pub struct WorkerReport {
    pub request_id: RequestId,
    pub state: WorkerState,
    pub succeeded: usize,
    pub failed: usize,
    /// Entities recorded as cancelled without being analyzed.
    pub cancelled: usize,
    /// Entities whose result the store refused. Not counted anywhere else.
    pub dropped: usize,
    /// Set if the worker task panicked, was aborted or timed out.
    pub panic_info: Option<String>,
}

impl WorkerReport {
    fn aborted(request_id: RequestId, panic_info: String) -> Self {
        Self {
            request_id,
            state: WorkerState::Running,
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            dropped: 0,
            panic_info: Some(panic_info),
        }
    }

    /// Number of entities written to the store.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

/// Drains a batch sequentially, recording each entity before the next starts.
pub(crate) struct Worker<A: EntityAnalyzer> {
    request_id: RequestId,
    analyzer: Arc<A>,
    store: Arc<ProgressStore<A::Report>>,
    batch: BatchRequest,
    cancel: Arc<AtomicBool>,
    on_progress: Option<Arc<ProgressCallback>>,
    state: WorkerState,
}

impl<A: EntityAnalyzer> Worker<A> {
    pub(crate) fn new(
        request_id: RequestId,
        analyzer: Arc<A>,
        store: Arc<ProgressStore<A::Report>>,
        batch: BatchRequest,
        cancel: Arc<AtomicBool>,
        on_progress: Option<Arc<ProgressCallback>>,
    ) -> Self {
        Self {
            request_id,
            analyzer,
            store,
            batch,
            cancel,
            on_progress,
            state: WorkerState::Idle,
        }
    }

    pub(crate) async fn run(mut self) -> WorkerReport {
        let request_id = self.request_id;
        let kind = self.analyzer.kind();
        let total = self.batch.entities.len();
        let on_progress = self.on_progress.clone();
        let on_progress = on_progress.as_deref();
        let start = Instant::now();

        self.state = WorkerState::Running;
        tracing::info!(%request_id, kind, total, "Analysis started");
        emit(
            on_progress,
            AnalysisProgress::BatchStarted {
                request_id,
                kind,
                total,
            },
        );

        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        let mut dropped = 0;
        let entities = std::mem::take(&mut self.batch.entities);

        for (index, entity) in entities.into_iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                self.state = WorkerState::Cancelled;
                let doc = FailureDocument::new(&entity.name, CANCELLED_ERROR);
                if self.write(&entity.name, EntityResult::Failure(doc)) {
                    cancelled += 1;
                } else {
                    dropped += 1;
                }
                continue;
            }

            emit(
                on_progress,
                AnalysisProgress::EntityStarted {
                    request_id,
                    entity: entity.name.clone(),
                    index,
                    total,
                },
            );
            let entity_start = Instant::now();
            let result = self
                .analyzer
                .analyze(&entity, &self.batch.params, on_progress)
                .await;
            let is_failure = result.is_failure();

            tracing::debug!(
                %request_id,
                entity = %entity.name,
                failed = is_failure,
                elapsed_ms = entity_start.elapsed().as_millis() as u64,
                "Entity analyzed"
            );
            if !self.write(&entity.name, result) {
                dropped += 1;
            } else if is_failure {
                failed += 1;
            } else {
                succeeded += 1;
            }
            emit(
                on_progress,
                AnalysisProgress::EntityCompleted {
                    request_id,
                    entity: entity.name,
                    failed: is_failure,
                },
            );
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if self.state == WorkerState::Cancelled {
            tracing::info!(
                %request_id,
                succeeded,
                failed,
                skipped = cancelled,
                dropped,
                elapsed_ms,
                "Analysis cancelled"
            );
            emit(
                on_progress,
                AnalysisProgress::BatchCancelled {
                    request_id,
                    skipped: cancelled,
                },
            );
        } else {
            self.state = WorkerState::Drained;
            tracing::info!(%request_id, succeeded, failed, dropped, elapsed_ms, "Analysis drained");
            emit(
                on_progress,
                AnalysisProgress::BatchDrained {
                    request_id,
                    succeeded,
                    failed,
                },
            );
        }

        WorkerReport {
            request_id,
            state: self.state,
            succeeded,
            failed,
            cancelled,
            dropped,
            panic_info: None,
        }
    }

    /// Record one result. Returns `false` if the store refused it.
    fn write(&self, entity: &str, result: EntityResult<A::Report>) -> bool {
        match self.store.record(&self.request_id, entity, result) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    request_id = %self.request_id,
                    entity,
                    error = %e,
                    "Dropped entity result"
                );
                false
            }
        }
    }
}

// Runs on drain, cancellation, abort and panic alike.
impl<A: EntityAnalyzer> Drop for Worker<A> {
    fn drop(&mut self) {
        self.store.close(&self.request_id);
    }
}

/// Handle on a dispatched batch.
///
/// Dropping the handle detaches the worker; it keeps running and recording.
#[derive(Debug)]
pub struct AnalysisHandle {
    request_id: RequestId,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<WorkerReport>,
}

impl AnalysisHandle {
    pub(crate) fn new(
        request_id: RequestId,
        cancel: Arc<AtomicBool>,
        join: JoinHandle<WorkerReport>,
    ) -> Self {
        Self {
            request_id,
            cancel,
            join,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Ask the worker to stop. Observed between entities: the entity in
    /// flight completes, every later one is recorded as cancelled.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// The flag [`cancel`](Self::cancel) sets, for wiring into signal handlers.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the worker to finish.
    pub async fn wait(self) -> WorkerReport {
        let request_id = self.request_id;
        match self.join.await {
            Ok(report) => report,
            Err(e) => {
                let info = join_error_info(e);
                tracing::error!(%request_id, panic_info = %info, "Analysis task failed");
                WorkerReport::aborted(request_id, info)
            }
        }
    }

    /// Wait at most `timeout`, aborting the worker if it has not finished.
    pub async fn wait_timeout(mut self, timeout: Duration) -> WorkerReport {
        let request_id = self.request_id;
        tokio::select! {
            result = &mut self.join => match result {
                Ok(report) => report,
                Err(e) => {
                    let info = join_error_info(e);
                    tracing::error!(%request_id, panic_info = %info, "Analysis task failed");
                    WorkerReport::aborted(request_id, info)
                }
            },
            _ = tokio::time::sleep(timeout) => {
                self.join.abort();
                let _ = (&mut self.join).await;
                tracing::error!(
                    %request_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Analysis task timed out; aborted"
                );
                WorkerReport::aborted(
                    request_id,
                    format!("timed out after {}ms", timeout.as_millis()),
                )
            }
        }
    }
}

fn join_error_info(e: tokio::task::JoinError) -> String {
    if e.is_panic() {
        let payload = e.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    } else if e.is_cancelled() {
        "Task was cancelled".to_string()
    } else {
        format!("Task failed: {e}")
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::analysis::{AnalysisParams, EntityRef};

    struct Constant;

    #[async_trait]
    impl EntityAnalyzer for Constant {
        type Report = u32;

        fn kind(&self) -> &'static str {
            "test"
        }

        async fn analyze(
            &self,
            _entity: &EntityRef,
            _params: &AnalysisParams,
            _on_progress: Option<&ProgressCallback>,
        ) -> EntityResult<u32> {
            EntityResult::Success(7)
        }
    }

    fn worker(store: &Arc<ProgressStore<u32>>, request_id: RequestId) -> Worker<Constant> {
        let batch = BatchRequest::new(
            vec![EntityRef::new("repoA"), EntityRef::new("repoB")],
            AnalysisParams::default(),
        );
        Worker::new(
            request_id,
            Arc::new(Constant),
            Arc::clone(store),
            batch,
            Arc::new(AtomicBool::new(false)),
            None,
        )
    }

    #[tokio::test]
    async fn refused_writes_are_reported_as_dropped() {
        let store = Arc::new(ProgressStore::new(Duration::from_secs(60)));
        // Never registered: the store refuses every write.
        let report = worker(&store, RequestId::new()).run().await;

        assert_eq!(report.state, WorkerState::Drained);
        assert_eq!((report.succeeded, report.failed), (0, 0));
        assert_eq!(report.dropped, 2);
        assert_eq!(report.recorded(), 0);
    }

    #[tokio::test]
    async fn recorded_writes_are_counted() {
        let store = Arc::new(ProgressStore::new(Duration::from_secs(60)));
        let request_id = RequestId::new();
        store.register(request_id, 2);

        let report = worker(&store, request_id).run().await;
        assert_eq!((report.succeeded, report.dropped), (2, 0));
        assert!(store.snapshot(&request_id).unwrap().is_done());
    }
}
