//! Progress reporting for analysis batches.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): an animated batch bar using indicatif
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use gtanalyzer::{AnalysisProgress, ProgressCallback};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Interactive progress bars for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: AnalysisProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use gtanalyzer::RequestId;

    use super::*;

    #[test]
    fn callback_forwards_events_without_panicking() {
        let reporter = Arc::new(ProgressReporter::Logging(LoggingReporter::new()));
        let callback = reporter.as_callback();
        let request_id = RequestId::new();

        callback(AnalysisProgress::BatchStarted {
            request_id,
            kind: "github",
            total: 1,
        });
        callback(AnalysisProgress::BatchDrained {
            request_id,
            succeeded: 1,
            failed: 0,
        });
        reporter.finish();
    }
}
