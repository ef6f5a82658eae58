// file: src/pipeline/progress.rs
// description: progress bars and counters for a running export
// reference: uses indicatif for progress bars and tracks decryption outcomes

use crate::pipeline::policy::ExportState;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;

/// Receives the processed count once per resolved record.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    pub records_resolved: u64,
    pub duration_secs: f64,
}

impl ExportStats {
    pub fn records_per_second(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.records_resolved as f64 / self.duration_secs
    }
}

pub struct ProgressTracker {
    main_bar: ProgressBar,
    detail_bar: ProgressBar,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self::with_color(total, true)
    }

    pub fn with_color(total: u64, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();

        let main_bar = create_progress_bar(&multi_progress, total, colored);
        let detail_bar = create_detail_bar(&multi_progress);

        Self {
            main_bar,
            detail_bar,
            start_time: Instant::now(),
        }
    }

    /// Tracker that draws nothing.
    pub fn hidden(total: u64) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::hidden());
        Self {
            main_bar: multi_progress.add(ProgressBar::new(total)),
            detail_bar: multi_progress.add(ProgressBar::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Moves the bar to `processed` and refreshes the outcome line.
    pub fn update(&self, state: &ExportState) {
        self.main_bar.set_position(state.progress);
        self.detail_bar.set_message(format!(
            "Success: {} | Errors: {} | Unverified: {}",
            state.success, state.error, state.unverified
        ));
    }

    pub fn position(&self) -> u64 {
        self.main_bar.position()
    }

    pub fn set_message(&self, message: String) {
        self.detail_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.main_bar.finish_with_message("Export complete");
        self.detail_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> ExportStats {
        ExportStats {
            records_resolved: self.main_bar.position(),
            duration_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }

    /// Callback form for the orchestrator.
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let tracker = Arc::clone(self);
        Arc::new(move |processed| tracker.main_bar.set_position(processed))
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.finish();
    }
}

fn style(template: &str, progress_chars: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(progress_chars)
}

fn create_progress_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    if colored {
        bar.set_style(style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            "█▓▒░",
        ));
    } else {
        bar.set_style(style(
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta}) {msg}",
            "=>-",
        ));
    }
    bar
}

fn create_detail_bar(multi_progress: &MultiProgress) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}
