//! Terminal progress for long stages.
//!
//! Bars and spinners are hidden in log-only mode; the enrichment loop then
//! reports progress through periodic log records instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Log-only mode (set from `--log-only` in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// "12.3s" under a minute, "4.1m" above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// Per-row bar for a stage; the message slot shows the row being worked on.
pub fn row_bar(len: u64, stage: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>14} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ETA {eta} {wide_msg}")
                .unwrap()
                .progress_chars("=> "),
        );
    }
    pb.set_prefix(stage.to_string());
    pb
}

/// Spinner for a stage step with no row count (joins, file writes).
pub fn stage_spinner(stage: &str, step: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:>14} {spinner} {msg} [{elapsed_precise}]")
                .unwrap(),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_prefix(stage.to_string());
    pb.set_message(step.to_string());
    pb
}

/// Every `interval` rows (and on the last row) in log-only mode.
pub fn log_progress(stage: &str, current: u64, total: u64, interval: u64) {
    if !is_log_only() || total == 0 || interval == 0 {
        return;
    }
    if current % interval == 0 || current == total {
        let pct = 100.0 * current as f64 / total as f64;
        tracing::info!(stage, current, total, "progress {:.1}%", pct);
    }
}
