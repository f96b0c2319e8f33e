//! Progress reporting types for analysis batches.
//!
//! Workers and upstream clients emit [`AnalysisProgress`] events through an
//! optional [`ProgressCallback`]; the CLI renders them as progress bars or
//! structured log lines.

use super::types::RequestId;

/// Progress events emitted while a batch is analyzed.
///
/// "Entity" is a repository for GitHub batches and a board for Taiga batches.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnalysisProgress {
    /// A worker picked up a batch.
    BatchStarted {
        request_id: RequestId,
        /// Backend kind (`"github"` or `"taiga"`).
        kind: &'static str,
        /// Number of entities in the batch.
        total: usize,
    },

    /// Analysis of one entity began.
    EntityStarted {
        request_id: RequestId,
        entity: String,
        /// Zero-based position within the batch.
        index: usize,
        total: usize,
    },

    /// An analyzer moved to its next upstream stage.
    StageStarted {
        entity: String,
        /// Stage label, e.g. `"branches"` or `"milestones"`.
        stage: &'static str,
    },

    /// An entity's result was written to the store.
    EntityCompleted {
        request_id: RequestId,
        entity: String,
        /// Whether the stored result is a failure document.
        failed: bool,
    },

    /// An upstream call is backing off before a retry.
    RateLimitBackoff {
        /// The upstream resource being retried (URL path).
        resource: String,
        /// How long until the retry fires.
        retry_after_ms: u64,
        /// Attempt number that just failed (1-indexed).
        attempt: u32,
    },

    /// The batch was fully processed.
    BatchDrained {
        request_id: RequestId,
        succeeded: usize,
        failed: usize,
    },

    /// The batch was cancelled before all entities were analyzed.
    BatchCancelled {
        request_id: RequestId,
        /// Entities recorded as cancelled without being analyzed.
        skipped: usize,
    },
}

/// Callback type for analysis progress.
pub type ProgressCallback = Box<dyn Fn(AnalysisProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use gtanalyzer::analysis::{emit, AnalysisProgress, ProgressCallback};
///
/// fn stage(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, AnalysisProgress::StageStarted {
///         entity: "repoA".to_string(),
///         stage: "branches",
///     });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: AnalysisProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn emit_with_none_is_noop() {
        emit(
            None,
            AnalysisProgress::StageStarted {
                entity: "repoA".to_string(),
                stage: "branches",
            },
        );
    }

    #[test]
    fn emit_forwards_event_to_callback() {
        let seen: Arc<Mutex<Vec<AnalysisProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&seen);
        let callback: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap().push(event);
        });

        emit(
            Some(&callback),
            AnalysisProgress::EntityCompleted {
                request_id: RequestId::new(),
                entity: "repoB".to_string(),
                failed: true,
            },
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(matches!(
            &seen[0],
            AnalysisProgress::EntityCompleted { entity, failed: true, .. } if entity == "repoB"
        ));
    }
}
