//! Non-interactive UI for CI/headless environments.

use super::progress::format_duration;
use super::theme::PromoteTheme;
use super::{OutputMode, RunSummary, SpinnerHandle, UserInterface};

/// UI implementation for non-interactive mode.
///
/// Plain lines without cursor control; spinners print once when they finish.
pub struct NonInteractiveUI {
    mode: OutputMode,
}

impl NonInteractiveUI {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl UserInterface for NonInteractiveUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("{}", msg);
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            println!("✓ {}", msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("⚠ {}", msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("✗ {}", msg);
    }

    fn start_spinner(&mut self, message: &str) -> Box<dyn SpinnerHandle> {
        if self.mode.shows_spinners() {
            println!("  {}", message);
        }
        Box::new(LineSpinner {
            quiet: !self.mode.shows_status(),
        })
    }

    fn show_header(&mut self, title: &str) {
        if self.mode.shows_status() {
            println!("\n▲ {}\n", title);
        }
    }

    fn show_progress(&mut self, current: usize, total: usize) {
        if self.mode.shows_status() {
            println!("[{}/{}]", current, total);
        }
    }

    fn is_interactive(&self) -> bool {
        false
    }

    fn show_error_block(&mut self, command: &str, output: &str) {
        eprintln!();
        eprintln!("    ┌─ Command ──────────────────────────");
        eprintln!("    │ {}", command);
        if !output.is_empty() {
            eprintln!("    ├─ Output ───────────────────────────");
            for line in output.lines() {
                eprintln!("    │ {}", line);
            }
        }
        eprintln!("    └────────────────────────────────────");
    }

    fn show_run_summary(&mut self, summary: &RunSummary) {
        if self.mode.shows_status() {
            println!();
            println!("  ┌─ {} ", summary.description);

            for stage in &summary.stages {
                let right_side = match (&stage.duration, &stage.detail) {
                    (Some(d), Some(detail)) => format!("{} · {}", format_duration(*d), detail),
                    (Some(d), None) => format_duration(*d),
                    (None, Some(detail)) => detail.clone(),
                    (None, None) => String::new(),
                };
                println!(
                    "  │ {} {:<28} {}",
                    stage.status.display_char(),
                    stage.name,
                    right_side
                );
            }

            println!("  ├────────────────────────────────────");
            println!(
                "  │ Total: {} · {} run · {} skipped",
                format_duration(summary.total_duration),
                summary.stages_run(),
                summary.stages_skipped(),
            );
            if let Some(link) = &summary.log_link {
                println!("  │ Logs: {}", link);
            }
            println!("  └────────────────────────────────────");
        }

        let line = format!("{} {}", summary.run_id, summary.status);
        match &summary.error {
            Some(error) => eprintln!("  ✗ {}: {}", line, error),
            None if summary.status.exit_code() == 0 => println!("  {}", line),
            None => eprintln!("  {}", line),
        }
    }
}

/// Spinner stand-in that prints one line when the operation finishes.
struct LineSpinner {
    quiet: bool,
}

impl SpinnerHandle for LineSpinner {
    fn set_message(&mut self, _msg: &str) {}

    fn finish_success(&mut self, msg: &str) {
        if !self.quiet {
            println!("{}", PromoteTheme::plain().format_success(msg));
        }
    }

    fn finish_error(&mut self, msg: &str) {
        eprintln!("{}", PromoteTheme::plain().format_error(msg));
    }

    fn finish_skipped(&mut self, msg: &str) {
        if !self.quiet {
            println!("⊘ {}", msg);
        }
    }
}
