use gtanalyzer::AnalysisProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: AnalysisProgress) {
        match event {
            AnalysisProgress::BatchStarted {
                request_id,
                kind,
                total,
            } => {
                tracing::info!(%request_id, kind, total, "Analyzing batch");
            }

            AnalysisProgress::EntityStarted {
                request_id,
                entity,
                index,
                total,
            } => {
                tracing::info!(
                    %request_id,
                    entity = %entity,
                    position = index + 1,
                    total,
                    "Analyzing entity"
                );
            }

            AnalysisProgress::StageStarted { entity, stage } => {
                tracing::debug!(entity = %entity, stage, "Stage started");
            }

            AnalysisProgress::EntityCompleted {
                request_id,
                entity,
                failed,
            } => {
                if failed {
                    tracing::warn!(%request_id, entity = %entity, "Entity failed");
                } else {
                    tracing::info!(%request_id, entity = %entity, "Entity complete");
                }
            }

            AnalysisProgress::RateLimitBackoff {
                resource,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    resource = %resource,
                    retry_after_ms,
                    attempt,
                    "Backing off before retry"
                );
            }

            AnalysisProgress::BatchDrained {
                request_id,
                succeeded,
                failed,
            } => {
                tracing::info!(%request_id, succeeded, failed, "Batch complete");
            }

            AnalysisProgress::BatchCancelled {
                request_id,
                skipped,
            } => {
                tracing::warn!(%request_id, skipped, "Batch cancelled");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
