//! Progress spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::theme::PromoteTheme;
use super::SpinnerHandle;

/// A progress spinner for long-running stages.
pub struct ProgressSpinner {
    bar: ProgressBar,
    theme: PromoteTheme,
}

impl ProgressSpinner {
    pub fn new(message: &str, theme: PromoteTheme) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.magenta} {msg} {elapsed:.dim}")
        {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self { bar, theme }
    }

    /// Create a spinner that doesn't show (for silent mode).
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            theme: PromoteTheme::plain(),
        }
    }

    fn finish_with(&mut self, line: String) {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg}") {
            self.bar.set_style(style);
        }
        self.bar.finish_with_message(line);
    }
}

impl SpinnerHandle for ProgressSpinner {
    fn set_message(&mut self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    fn finish_success(&mut self, msg: &str) {
        let line = self.theme.format_success(msg);
        self.finish_with(line);
    }

    fn finish_error(&mut self, msg: &str) {
        let line = self.theme.format_error(msg);
        self.finish_with(line);
    }

    fn finish_skipped(&mut self, msg: &str) {
        let line = format!("{}", self.theme.dim.apply_to(format!("⊘ {}", msg)));
        self.finish_with(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_spinner_finishes() {
        let mut spinner = ProgressSpinner::hidden();
        spinner.set_message("Deploying");
        spinner.finish_success("Deployed");
        assert!(spinner.bar.is_finished());
    }

    #[test]
    fn finished_message_uses_theme() {
        let mut spinner = ProgressSpinner::hidden();
        spinner.finish_error("Deploy failed");
        assert_eq!(spinner.bar.message(), "✗ Deploy failed");
    }

    #[test]
    fn skipped_message() {
        let mut spinner = ProgressSpinner::hidden();
        spinner.finish_skipped("Backup");
        assert_eq!(spinner.bar.message(), "⊘ Backup");
    }
}
