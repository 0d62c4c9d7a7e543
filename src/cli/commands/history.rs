//! History command implementation.
//!
//! The `sfpromote history` command lists past runs, newest first.

use crate::cli::args::HistoryArgs;
use crate::environment::Environment;
use crate::error::Result;
use crate::state::RunRecord;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectContext};
use super::display::show_run_line;

/// The history command implementation.
pub struct HistoryCommand {
    project: ProjectContext,
    args: HistoryArgs,
}

impl HistoryCommand {
    /// Create a new history command.
    pub fn new(project: ProjectContext, args: HistoryArgs) -> Self {
        Self { project, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &HistoryArgs {
        &self.args
    }

    fn select(&self, runs: Vec<RunRecord>) -> Result<Vec<RunRecord>> {
        let environment = match self.args.env.as_deref() {
            Some(value) => Some(value.parse::<Environment>()?),
            None => None,
        };

        Ok(runs
            .into_iter()
            .filter(|run| environment.is_none_or(|env| run.parameters.environment == env))
            .take(self.args.limit.unwrap_or(10))
            .collect())
    }
}

impl Command for HistoryCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.project.load_config()?;
        let runs = self.select(self.project.store(&config).list()?)?;

        if self.args.json {
            let json = serde_json::to_string_pretty(&runs).map_err(anyhow::Error::from)?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        if runs.is_empty() {
            ui.message("No run history for this project.");
            return Ok(CommandResult::success());
        }

        ui.show_header("Run History");
        for run in &runs {
            show_run_line(ui, run);
            if let Some(error) = &run.error {
                ui.error(&format!("    Error: {}", error));
            }
        }

        Ok(CommandResult::success())
    }
}
