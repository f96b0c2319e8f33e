use std::sync::Arc;

use super::types::{EntityResult, RequestId};
use crate::store::{ProgressStore, Snapshot, StoreError};

/// Read-only view over a [`ProgressStore`].
///
/// Polling never blocks on the worker and never mutates the store.
pub struct ResultPoller<R> {
    store: Arc<ProgressStore<R>>,
}

impl<R> Clone for ResultPoller<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<R: Clone> ResultPoller<R> {
    pub fn new(store: Arc<ProgressStore<R>>) -> Self {
        Self { store }
    }

    /// Current snapshot of a request, possibly partial.
    pub fn poll(&self, request_id: &RequestId) -> Result<Snapshot<R>, StoreError> {
        self.store.snapshot(request_id)
    }

    /// Result of one entity, or `NotReady` while it is still pending.
    pub fn poll_entity(
        &self,
        request_id: &RequestId,
        entity: &str,
    ) -> Result<EntityResult<R>, StoreError> {
        self.store.get(request_id, entity)
    }
}
