//! Shared display helpers for run status formatting.
//!
//! Used by `history` and `show` to render [`RunStatus`] values consistently.

use crate::state::{RunRecord, RunStatus};
use crate::ui::{format_duration, format_relative_time, UserInterface};

/// Bracketed symbol for a run status (non-TTY friendly).
pub fn status_symbol(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "[ok]",
        RunStatus::Unstable => "[unstable]",
        RunStatus::Failure => "[FAIL]",
        RunStatus::Aborted => "[aborted]",
        RunStatus::AwaitingApproval => "[waiting]",
        RunStatus::Running => "[running]",
    }
}

/// One-line summary of a run.
pub fn run_line(record: &RunRecord) -> String {
    let counts = record.counts();
    format!(
        "{} {} {} ({}) - {} ({} run, {} skipped, {})",
        status_symbol(record.status),
        record.id,
        format_relative_time(record.started_at),
        record.started_at.format("%Y-%m-%d %H:%M"),
        record.description,
        counts.run,
        counts.skipped,
        format_duration(record.duration())
    )
}

/// Print a run line, styled by severity.
pub fn show_run_line(ui: &mut dyn UserInterface, record: &RunRecord) {
    let line = run_line(record);
    match record.status {
        RunStatus::Success => ui.success(&line),
        RunStatus::Failure => ui.error(&line),
        RunStatus::Unstable | RunStatus::Aborted | RunStatus::AwaitingApproval => {
            ui.warning(&line)
        }
        RunStatus::Running => ui.message(&line),
    }
}
