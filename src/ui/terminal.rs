//! Interactive terminal UI.

use console::Term;
use std::io::Write;

use super::progress::format_duration;
use super::{
    should_use_colors, NonInteractiveUI, OutputMode, ProgressSpinner, PromoteTheme, RunSummary,
    SpinnerHandle, UserInterface,
};

/// Interactive terminal UI implementation.
pub struct TerminalUI {
    term: Term,
    theme: PromoteTheme,
    mode: OutputMode,
}

impl TerminalUI {
    pub fn new(mode: OutputMode) -> Self {
        let theme = if should_use_colors() {
            PromoteTheme::new()
        } else {
            PromoteTheme::plain()
        };

        Self {
            term: Term::stdout(),
            theme,
            mode,
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", msg).ok();
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_success(msg)).ok();
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "{}", self.theme.format_warning(msg)).ok();
        }
    }

    fn error(&mut self, msg: &str) {
        writeln!(self.term, "{}", self.theme.format_error(msg)).ok();
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            Box::new(ProgressSpinner::new(message, self.theme.clone()))
        } else {
            Box::new(ProgressSpinner::hidden())
        }
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            writeln!(self.term, "\n{}\n", self.theme.format_header(title)).ok();
        }
    }

    fn show_progress(&mut self, current: usize, total: usize) {
        if self.mode.shows_status() {
            writeln!(
                self.term,
                "{}",
                self.theme.dim.apply_to(format!("[{}/{}]", current, total))
            )
            .ok();
        }
    }

    fn is_interactive(&self) -> bool {
        self.term.is_term()
    }

    fn show_error_block(&mut self, command: &str, output: &str) {
        let b = &self.theme.border;
        writeln!(
            self.term,
            "    {} {}",
            b.apply_to("┌─"),
            b.apply_to("Command ──────────────────────────")
        )
        .ok();
        writeln!(
            self.term,
            "    {} {}",
            b.apply_to("│"),
            self.theme.highlight.apply_to(command)
        )
        .ok();

        if !output.is_empty() {
            writeln!(
                self.term,
                "    {} {}",
                b.apply_to("├─"),
                b.apply_to("Output ───────────────────────────")
            )
            .ok();
            for line in output.lines() {
                writeln!(self.term, "    {} {}", b.apply_to("│"), line).ok();
            }
        }

        writeln!(
            self.term,
            "    {}",
            b.apply_to("└────────────────────────────────────")
        )
        .ok();
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        let b = &self.theme.border;

        if self.mode.shows_status() {
            writeln!(self.term).ok();
            writeln!(
                self.term,
                "  {} {}",
                b.apply_to("┌─"),
                self.theme.highlight.apply_to(&summary.description)
            )
            .ok();

            for stage in &summary.stages {
                let icon = self
                    .theme
                    .stage_style(stage.status)
                    .apply_to(stage.status.display_char());
                let duration = stage.duration.map(format_duration).unwrap_or_default();
                let detail = stage.detail.as_deref().unwrap_or("");

                writeln!(
                    self.term,
                    "  {} {} {:<28} {} {}",
                    b.apply_to("│"),
                    icon,
                    stage.name,
                    self.theme.dim.apply_to(duration),
                    self.theme.dim.apply_to(detail),
                )
                .ok();
            }

            writeln!(
                self.term,
                "  {}",
                b.apply_to("├────────────────────────────────────")
            )
            .ok();
            writeln!(
                self.term,
                "  {} Total: {} {} {} run {} {} skipped",
                b.apply_to("│"),
                format_duration(summary.total_duration),
                self.theme.dim.apply_to("·"),
                summary.stages_run(),
                self.theme.dim.apply_to("·"),
                summary.stages_skipped(),
            )
            .ok();
            if let Some(link) = &summary.log_link {
                writeln!(
                    self.term,
                    "  {} {} {}",
                    b.apply_to("│"),
                    self.theme.key.apply_to("Logs:"),
                    link
                )
                .ok();
            }
            writeln!(
                self.term,
                "  {}",
                b.apply_to("└────────────────────────────────────")
            )
            .ok();
        }

        let error = summary
            .error
            .as_deref()
            .map(|e| format!(" {}", self.theme.error.apply_to(e)))
            .unwrap_or_default();
        writeln!(
            self.term,
            "  {} {}{}",
            self.theme.highlight.apply_to(&summary.run_id),
            self.theme.format_run_status(summary.status),
            error
        )
        .ok();
    }
}

/// Create the appropriate UI based on context.
pub fn create_ui(interactive: bool, mode: OutputMode) -> Box<dyn UserInterface> {
    if interactive && Term::stdout().is_term() {
        Box::new(TerminalUI::new(mode))
    } else {
        Box::new(NonInteractiveUI::new(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_ui_output_mode() {
        let ui = TerminalUI::new(OutputMode::Quiet);
        assert_eq!(ui.output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn create_ui_non_interactive() {
        let ui = create_ui(false, OutputMode::Normal);
        assert!(!ui.is_interactive());
    }

    #[test]
    fn create_ui_respects_mode() {
        let ui = create_ui(false, OutputMode::Silent);
        assert_eq!(ui.output_mode(), OutputMode::Silent);
    }
}
