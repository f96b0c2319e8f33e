use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use super::progress::ProgressCallback;
use super::types::{BatchRequest, DispatchAck, DispatchError, EntityAnalyzer, RequestId};
use super::worker::{AnalysisHandle, Worker};
use crate::store::ProgressStore;

/// Accepts batches and starts one background worker per batch.
///
/// Overlapping batches are not queued; each dispatch runs independently.
pub struct Dispatcher<A: EntityAnalyzer> {
    analyzer: Arc<A>,
    store: Arc<ProgressStore<A::Report>>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl<A: EntityAnalyzer> Clone for Dispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            analyzer: Arc::clone(&self.analyzer),
            store: Arc::clone(&self.store),
            on_progress: self.on_progress.clone(),
        }
    }
}

impl<A: EntityAnalyzer> Dispatcher<A> {
    pub fn new(analyzer: Arc<A>, store: Arc<ProgressStore<A::Report>>) -> Self {
        Self {
            analyzer,
            store,
            on_progress: None,
        }
    }

    /// Report worker progress through `on_progress`.
    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn analyzer(&self) -> &Arc<A> {
        &self.analyzer
    }

    pub fn store(&self) -> &Arc<ProgressStore<A::Report>> {
        &self.store
    }

    /// Validate the batch, register it and spawn its worker.
    ///
    /// Returns without waiting for any entity. Must be called within a tokio
    /// runtime.
    pub fn dispatch(
        &self,
        batch: BatchRequest,
    ) -> Result<(DispatchAck, AnalysisHandle), DispatchError> {
        validate(&batch)?;

        let request_id = RequestId::new();
        let combinations = batch.entities.len();
        self.store.register(request_id, combinations);

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = Worker::new(
            request_id,
            Arc::clone(&self.analyzer),
            Arc::clone(&self.store),
            batch,
            Arc::clone(&cancel),
            self.on_progress.clone(),
        );
        let join = tokio::spawn(worker.run());

        tracing::debug!(%request_id, combinations, kind = self.analyzer.kind(), "Dispatched batch");
        Ok((
            DispatchAck {
                saved: true,
                combinations,
                request_id,
            },
            AnalysisHandle::new(request_id, cancel, join),
        ))
    }
}

/// Reject empty batches, blank names and duplicate names.
pub fn validate(batch: &BatchRequest) -> Result<(), DispatchError> {
    if batch.entities.is_empty() {
        return Err(DispatchError::EmptyBatch);
    }

    let mut seen = HashSet::with_capacity(batch.entities.len());
    for (index, entity) in batch.entities.iter().enumerate() {
        if entity.name.trim().is_empty() {
            return Err(DispatchError::BlankEntityName { index });
        }
        if !seen.insert(entity.name.as_str()) {
            return Err(DispatchError::DuplicateEntity {
                name: entity.name.clone(),
            });
        }
    }
    Ok(())
}
