use std::sync::Mutex;
use std::time::Duration;

use gtanalyzer::AnalysisProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

#[derive(Default)]
struct ProgressState {
    /// One bar per batch, advanced as entities are recorded.
    batch_bar: Option<ProgressBar>,
    /// Spinner shown while an upstream call is backing off.
    backoff_bar: Option<ProgressBar>,
}

impl ProgressState {
    fn clear_backoff(&mut self) {
        if let Some(pb) = self.backoff_bar.take() {
            pb.finish_and_clear();
        }
    }
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: AnalysisProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            AnalysisProgress::BatchStarted { kind, total, .. } => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::bar_style());
                pb.set_prefix(kind);
                pb.set_message("starting");
                state.batch_bar = Some(pb);
            }

            AnalysisProgress::EntityStarted { entity, .. } => {
                if let Some(ref pb) = state.batch_bar {
                    pb.set_message(entity);
                }
            }

            AnalysisProgress::StageStarted { entity, stage } => {
                state.clear_backoff();
                if let Some(ref pb) = state.batch_bar {
                    pb.set_message(format!("{entity}: {stage}"));
                }
            }

            AnalysisProgress::EntityCompleted { entity, failed, .. } => {
                state.clear_backoff();
                if let Some(ref pb) = state.batch_bar {
                    pb.inc(1);
                    if failed {
                        pb.println(format!("  ✗ {entity} failed"));
                    }
                }
            }

            AnalysisProgress::RateLimitBackoff {
                resource,
                retry_after_ms,
                attempt,
            } => {
                let pb = state.backoff_bar.get_or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new_spinner());
                    bar.set_style(Self::spinner_style());
                    bar.set_prefix("retry");
                    bar.enable_steady_tick(Duration::from_millis(100));
                    bar
                });
                pb.set_message(format!(
                    "{resource} in {:.1}s (attempt {attempt})",
                    retry_after_ms as f64 / 1000.0
                ));
            }

            AnalysisProgress::BatchDrained {
                succeeded, failed, ..
            } => {
                state.clear_backoff();
                if let Some(pb) = state.batch_bar.take() {
                    pb.finish_with_message(format!("{succeeded} succeeded, {failed} failed"));
                }
            }

            AnalysisProgress::BatchCancelled { skipped, .. } => {
                state.clear_backoff();
                if let Some(pb) = state.batch_bar.take() {
                    pb.abandon_with_message(format!("cancelled, {skipped} skipped"));
                }
            }

            _ => {}
        }
    }

    /// Finish all progress bars.
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.clear_backoff();
        if let Some(pb) = state.batch_bar.take()
            && !pb.is_finished()
        {
            pb.finish();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.yellow} {spinner:.yellow} {msg}")
            .expect("Invalid template")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .expect("Invalid template")
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
