use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::progress::ProgressCallback;
use crate::platform::UpstreamError;

/// Opaque identifier correlating a dispatch with later polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a fresh random (v4) identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One entity of a batch: a repository name or a board slug, with an
/// optional per-entity date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntityRefRepr")]
pub struct EntityRef {
    pub name: String,
    #[serde(rename = "start_date", skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(rename = "end_date", skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl EntityRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: None,
            end: None,
        }
    }

    #[must_use]
    pub fn with_window(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// Entities are accepted either as a bare name or as an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum EntityRefRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
}

impl From<EntityRefRepr> for EntityRef {
    fn from(repr: EntityRefRepr) -> Self {
        match repr {
            EntityRefRepr::Name(name) => EntityRef::new(name),
            EntityRefRepr::Full {
                name,
                start_date,
                end_date,
            } => EntityRef::new(name).with_window(start_date, end_date),
        }
    }
}

/// Parameters shared by every entity of a batch.
///
/// A per-entity window on [`EntityRef`] takes precedence over this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Repository owner (user or organization). Unused by board analysis.
    pub owner: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl AnalysisParams {
    #[must_use]
    pub fn for_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_window(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// A batch submitted for analysis.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub entities: Vec<EntityRef>,
    pub params: AnalysisParams,
}

impl BatchRequest {
    #[must_use]
    pub fn new(entities: Vec<EntityRef>, params: AnalysisParams) -> Self {
        Self { entities, params }
    }
}

/// Immediate answer to a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAck {
    pub saved: bool,
    /// Number of entities the batch will record.
    pub combinations: usize,
    pub request_id: RequestId,
}

/// Stored in place of a report when an entity could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDocument {
    pub entity_name: String,
    pub error: String,
    pub failed: bool,
}

impl FailureDocument {
    #[must_use]
    pub fn new(entity_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            error: error.into(),
            failed: true,
        }
    }

    /// Failure document for an upstream error, carrying its short reason.
    #[must_use]
    pub fn from_upstream(entity_name: impl Into<String>, err: &UpstreamError) -> Self {
        Self::new(entity_name, err.reason())
    }
}

/// Outcome of analyzing one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityResult<R> {
    Success(R),
    Failure(FailureDocument),
}

impl<R> EntityResult<R> {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, EntityResult::Failure(_))
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FailureDocument> {
        match self {
            EntityResult::Failure(doc) => Some(doc),
            EntityResult::Success(_) => None,
        }
    }

    #[must_use]
    pub fn success(&self) -> Option<&R> {
        match self {
            EntityResult::Success(report) => Some(report),
            EntityResult::Failure(_) => None,
        }
    }
}

/// Per-backend analysis of a single entity.
///
/// Implementations never fail: every upstream error is folded into
/// [`EntityResult::Failure`].
#[async_trait]
pub trait EntityAnalyzer: Send + Sync + 'static {
    type Report: Serialize + Clone + Send + Sync + 'static;

    /// Backend label used in progress events and logs.
    fn kind(&self) -> &'static str;

    async fn analyze(
        &self,
        entity: &EntityRef,
        params: &AnalysisParams,
        on_progress: Option<&ProgressCallback>,
    ) -> EntityResult<Self::Report>;
}

/// Synchronous rejection of a malformed batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("batch has no entities")]
    EmptyBatch,

    #[error("entity at index {index} has a blank name")]
    BlankEntityName { index: usize },

    #[error("entity '{name}' appears more than once in the batch")]
    DuplicateEntity { name: String },
}
