//! Terminal progress for batch runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use opuskit_pipeline::OperationResult;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const BATCH_TEMPLATE: &str =
    "{prefix:.bold} {spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})";

/// Progress bar fed by the executor observer
///
/// Counts finished units and keeps a running failure tally in the bar
/// message. Failures are also printed above the bar as they happen.
#[derive(Debug)]
pub struct BatchProgress {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl BatchProgress {
    /// A bar over `total` units labelled `label`; drawn on stderr only when `visible`
    pub fn new(total: u64, label: &str, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let style = ProgressStyle::with_template(BATCH_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = ProgressBar::with_draw_target(Some(total), target)
            .with_style(style)
            .with_prefix(label.to_string());
        if visible {
            bar.enable_steady_tick(Duration::from_millis(120));
        }

        Self {
            bar,
            failed: AtomicUsize::new(0),
        }
    }

    /// Account for one finished unit
    pub fn observe(&self, result: &OperationResult) {
        if let Some(err) = result.error() {
            let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
            self.bar.set_message(format!("{failed} failed"));
            self.bar
                .println(format!("{} {} {}", "✗".red(), result.unit_id, err));
        }
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

/// Spinner for work without a known length
pub fn spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let pb = ProgressBar::new_spinner()
        .with_style(style)
        .with_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
