//! Visual theme and styling.

use console::Style;

use crate::state::RunStatus;
use crate::steps::StageStatus;

/// sfpromote's visual theme.
#[derive(Debug, Clone)]
pub struct PromoteTheme {
    /// Style for success messages (green).
    pub success: Style,
    /// Style for warnings and unstable results (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for running elements (magenta).
    pub info: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for highlighted/important text (bold).
    pub highlight: Style,
    /// Style for headers (magenta bold).
    pub header: Style,
    /// Style for box-drawing borders (dim).
    pub border: Style,
    /// Style for key labels in key-value displays (bold).
    pub key: Style,
}

impl Default for PromoteTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl PromoteTheme {
    pub fn new() -> Self {
        Self {
            success: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            info: Style::new().magenta(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
            header: Style::new().bold().magenta(),
            border: Style::new().dim(),
            key: Style::new().bold(),
        }
    }

    /// Create a theme without colors (for non-TTY or --no-color).
    pub fn plain() -> Self {
        Self {
            success: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
            header: Style::new(),
            border: Style::new(),
            key: Style::new(),
        }
    }

    /// Format a success message (icon + text in green).
    pub fn format_success(&self, msg: &str) -> String {
        format!("{}", self.success.apply_to(format!("✓ {}", msg)))
    }

    /// Format a warning message (icon + text in orange).
    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    /// Format an error message (icon + text in red bold).
    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format a header banner.
    pub fn format_header(&self, title: &str) -> String {
        format!("{} {}", self.header.apply_to("▲"), self.highlight.apply_to(title))
    }

    /// Style for a stage status.
    pub fn stage_style(&self, status: StageStatus) -> &Style {
        match status {
            StageStatus::Success => &self.success,
            StageStatus::Unstable => &self.warning,
            StageStatus::Failed | StageStatus::Aborted => &self.error,
            StageStatus::Skipped => &self.dim,
        }
    }

    /// Style for a run status.
    pub fn run_style(&self, status: RunStatus) -> &Style {
        match status {
            RunStatus::Success => &self.success,
            RunStatus::Unstable | RunStatus::AwaitingApproval => &self.warning,
            RunStatus::Failure | RunStatus::Aborted => &self.error,
            RunStatus::Running => &self.info,
        }
    }

    /// Status icon and name, styled.
    pub fn format_stage_status(&self, status: StageStatus) -> String {
        format!(
            "{}",
            self.stage_style(status)
                .apply_to(format!("{} {}", status.display_char(), status))
        )
    }

    /// Run status name, styled.
    pub fn format_run_status(&self, status: RunStatus) -> String {
        format!("{}", self.run_style(status).apply_to(status.name()))
    }
}

/// Check if colors should be enabled.
pub fn should_use_colors() -> bool {
    // https://no-color.org/
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    console::Term::stdout().is_term()
}
