//! Request-scoped, in-memory store of per-entity results.
//!
//! A [`ProgressStore`] maps each request to the results its worker has
//! recorded so far. It is constructed explicitly and shared through an `Arc`
//! with the dispatcher (writes) and any number of pollers (reads).
//!
//! Entries are write-once per entity and kept in write order. A request only
//! becomes evictable once it is complete (every expected entity recorded) or
//! closed by its worker; the TTL is counted from that moment.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use serde::Serialize;
use serde::ser::{SerializeMap, SerializeStruct};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::analysis::{EntityResult, RequestId};

/// Errors from store reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request was never registered, or has expired.
    #[error("unknown request id {request_id}")]
    UnknownRequest { request_id: RequestId },

    /// The entity has not been recorded yet.
    #[error("entity '{entity}' of request {request_id} has not completed")]
    NotReady {
        request_id: RequestId,
        entity: String,
    },

    #[error("entity '{entity}' of request {request_id} is already recorded")]
    AlreadyRecorded {
        request_id: RequestId,
        entity: String,
    },
}

impl StoreError {
    /// Whether the caller should keep polling rather than give up.
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownRequest { .. } | StoreError::NotReady { .. }
        )
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

struct RequestEntry<R> {
    expected: usize,
    results: Vec<(String, EntityResult<R>)>,
    /// Set when the last entity is recorded or the worker closes the request.
    finished_at: Option<Instant>,
}

impl<R> RequestEntry<R> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.finished_at
            .is_some_and(|finished| now.duration_since(finished) > ttl)
    }
}

/// Shared progress store, generic over the per-entity report type.
pub struct ProgressStore<R> {
    ttl: Duration,
    entries: RwLock<HashMap<RequestId, RequestEntry<R>>>,
}

impl<R> std::fmt::Debug for ProgressStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("ttl", &self.ttl)
            .field("requests", &self.len())
            .finish()
    }
}

impl<R: Clone> ProgressStore<R> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a request that will record `expected` entities.
    pub fn register(&self, request_id: RequestId, expected: usize) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.evict_locked(&mut entries);
        entries.insert(
            request_id,
            RequestEntry {
                expected,
                results: Vec::with_capacity(expected),
                finished_at: (expected == 0).then(Instant::now),
            },
        );
    }

    /// Record the result for one entity. Each entity may be recorded once.
    pub fn record(
        &self,
        request_id: &RequestId,
        entity: &str,
        result: EntityResult<R>,
    ) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.evict_locked(&mut entries);

        let entry = entries
            .get_mut(request_id)
            .ok_or(StoreError::UnknownRequest {
                request_id: *request_id,
            })?;
        if entry.results.iter().any(|(name, _)| name == entity) {
            return Err(StoreError::AlreadyRecorded {
                request_id: *request_id,
                entity: entity.to_string(),
            });
        }

        entry.results.push((entity.to_string(), result));
        if entry.results.len() >= entry.expected {
            entry.finished_at.get_or_insert_with(Instant::now);
        }
        Ok(())
    }

    /// Start the TTL of a request whose worker has stopped, complete or not.
    ///
    /// A no-op for unknown requests and for requests already finished.
    pub fn close(&self, request_id: &RequestId) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(request_id) {
            entry.finished_at.get_or_insert_with(Instant::now);
        }
    }

    /// Everything recorded so far for a request.
    pub fn snapshot(&self, request_id: &RequestId) -> Result<Snapshot<R>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .get(request_id)
            .filter(|e| !self.is_expired(e))
            .ok_or(StoreError::UnknownRequest {
                request_id: *request_id,
            })?;

        Ok(Snapshot {
            request_id: *request_id,
            expected: entry.expected,
            results: entry.results.clone(),
        })
    }

    /// The result of a single entity.
    pub fn get(&self, request_id: &RequestId, entity: &str) -> Result<EntityResult<R>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries
            .get(request_id)
            .filter(|e| !self.is_expired(e))
            .ok_or(StoreError::UnknownRequest {
                request_id: *request_id,
            })?;

        entry
            .results
            .iter()
            .find(|(name, _)| name == entity)
            .map(|(_, result)| result.clone())
            .ok_or_else(|| StoreError::NotReady {
                request_id: *request_id,
                entity: entity.to_string(),
            })
    }

    /// Drop requests finished for longer than the TTL. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        self.evict_locked(&mut entries)
    }

    fn evict_locked(&self, entries: &mut HashMap<RequestId, RequestEntry<R>>) -> usize {
        let before = entries.len();
        let ttl = self.ttl;
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now, ttl));
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired requests");
        }
        evicted
    }

    fn is_expired(&self, entry: &RequestEntry<R>) -> bool {
        entry.is_expired(Instant::now(), self.ttl)
    }
}

impl<R> ProgressStore<R> {
    /// Number of requests currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Clone + Send + Sync + 'static> ProgressStore<R> {
    /// Periodically evict expired requests in the background.
    ///
    /// The task holds only a weak reference and exits once the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.evict_expired();
            }
        })
    }
}

/// Point-in-time view of one request.
///
/// Serializes as `{request_id, expected, completed, done, results}` where
/// `results` is an object keyed by entity name in write order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    pub request_id: RequestId,
    pub expected: usize,
    results: Vec<(String, EntityResult<R>)>,
}

impl<R> Snapshot<R> {
    /// Number of entities recorded.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.results.len()
    }

    /// Whether every expected entity has been recorded.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.results.len() >= self.expected
    }

    /// Recorded results in write order.
    #[must_use]
    pub fn results(&self) -> &[(String, EntityResult<R>)] {
        &self.results
    }

    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&EntityResult<R>> {
        self.results
            .iter()
            .find(|(name, _)| name == entity)
            .map(|(_, r)| r)
    }

    /// Entity names in write order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|(name, _)| name.as_str())
    }
}

struct OrderedResults<'a, R>(&'a [(String, EntityResult<R>)]);

impl<R: Serialize> Serialize for OrderedResults<'_, R> {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, result) in self.0 {
            map.serialize_entry(name, result)?;
        }
        map.end()
    }
}

impl<R: Serialize> Serialize for Snapshot<R> {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Snapshot", 5)?;
        state.serialize_field("request_id", &self.request_id)?;
        state.serialize_field("expected", &self.expected)?;
        state.serialize_field("completed", &self.completed())?;
        state.serialize_field("done", &self.is_done())?;
        state.serialize_field("results", &OrderedResults(&self.results))?;
        state.end()
    }
}
