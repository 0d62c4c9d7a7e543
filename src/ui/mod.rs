//! Interactive user interface components.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for interactive terminal usage
//! - [`NonInteractiveUI`] for CI/headless environments
//! - [`MockUI`] for tests
//!
//! # Example
//!
//! ```
//! use sfpromote::ui::{create_ui, OutputMode};
//!
//! let mut ui = create_ui(false, OutputMode::Quiet);
//! ui.show_header("QA deploy");
//! ui.success("Deployed");
//! ```

pub mod mock;
pub mod non_interactive;
pub mod output;
pub mod progress;
pub mod prompts;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::{MockSpinner, MockUI, SpinnerStatus};
pub use non_interactive::NonInteractiveUI;
pub use output::OutputMode;
pub use progress::{format_duration, format_relative_time};
pub use prompts::prompt_user;
pub use spinner::ProgressSpinner;
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, PromoteTheme};

use std::time::Duration;

use crate::state::{RunRecord, RunStatus};
use crate::steps::StageStatus;

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display a message to the user.
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Start a spinner for an operation.
    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle>;

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Show progress (e.g., "Stage 3 of 12").
    fn show_progress(&mut self, current: usize, total: usize);

    /// Check if running in interactive mode.
    fn is_interactive(&self) -> bool;

    /// Show the command that failed and its (masked) output.
    fn show_error_block(&mut self, command: &str, output: &str) {
        self.error(command);
        if !output.is_empty() {
            self.message(output);
        }
    }

    /// Show the end-of-run summary.
    fn show_run_summary(&mut self, summary: &RunSummary) {
        let line = format!("{} {}", summary.run_id, summary.status);
        match summary.status {
            RunStatus::Success => self.success(&line),
            RunStatus::Unstable | RunStatus::AwaitingApproval => self.warning(&line),
            _ => self.error(&line),
        }
    }
}

/// Handle for controlling a spinner.
pub trait SpinnerHandle {
    /// Update the spinner message.
    fn set_message(&mut self, msg: &str);

    /// Mark the operation as successful.
    fn finish_success(&mut self, msg: &str);

    /// Mark the operation as failed.
    fn finish_error(&mut self, msg: &str);

    /// Mark as skipped.
    fn finish_skipped(&mut self, msg: &str);
}

/// A prompt to show to the user.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Unique key for the prompt (used for lookup and env overrides).
    pub key: String,
    /// The question to display.
    pub question: String,
    /// The type of prompt.
    pub prompt_type: PromptType,
    /// Default value if user just presses enter.
    pub default: Option<String>,
}

/// The type of prompt.
#[derive(Debug, Clone)]
pub enum PromptType {
    /// Yes/no confirmation.
    Confirm,
    /// Free-form text input.
    Input,
    /// Select one from a list of options.
    Select { options: Vec<PromptOption> },
}

/// An option in a select prompt.
#[derive(Debug, Clone)]
pub struct PromptOption {
    /// Display label.
    pub label: String,
    /// Value returned when selected.
    pub value: String,
}

/// Result of a prompt.
#[derive(Debug, Clone)]
pub enum PromptResult {
    /// Boolean result from confirm.
    Bool(bool),
    /// String result from input or select.
    String(String),
}

impl PromptResult {
    pub fn as_string(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::String(s) => s.clone(),
        }
    }

    /// Get as bool if this is a Bool result.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Parse a yes/no answer the way confirm prompts accept it.
pub(crate) fn parse_confirm(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "1"
    )
}

/// One stage line in a run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct StageLine {
    pub name: String,
    pub status: StageStatus,
    pub duration: Option<Duration>,
    pub detail: Option<String>,
}

/// Everything shown at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub description: String,
    pub status: RunStatus,
    pub stages: Vec<StageLine>,
    pub total_duration: Duration,
    pub log_link: Option<String>,
    pub error: Option<String>,
}

impl RunSummary {
    /// Summary of a (possibly unfinished) run record.
    pub fn from_record(record: &RunRecord) -> Self {
        let stages = record
            .stages
            .iter()
            .map(|result| StageLine {
                name: result.stage.name().to_string(),
                status: result.status,
                duration: (result.status != StageStatus::Skipped).then(|| result.duration()),
                detail: result.message.clone(),
            })
            .collect();

        Self {
            run_id: record.id.to_string(),
            description: record.description.clone(),
            status: record.status,
            stages,
            total_duration: record.duration(),
            log_link: record.log_url.clone(),
            error: record.error.clone(),
        }
    }

    /// Number of stages that ran (not skipped).
    pub fn stages_run(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status != StageStatus::Skipped)
            .count()
    }

    pub fn stages_skipped(&self) -> usize {
        self.stages.len() - self.stages_run()
    }
}
