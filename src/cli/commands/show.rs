//! Show command implementation.
//!
//! The `sfpromote show` command prints one run in detail: its stages,
//! approval, ticket and where the full log lives.

use crate::cli::args::ShowArgs;
use crate::error::Result;
use crate::state::{RunId, RunRecord};
use crate::ui::{RunSummary, UserInterface};

use super::dispatcher::{Command, CommandResult, ProjectContext};

/// The show command implementation.
pub struct ShowCommand {
    project: ProjectContext,
    args: ShowArgs,
}

impl ShowCommand {
    pub fn new(project: ProjectContext, args: ShowArgs) -> Self {
        Self { project, args }
    }

    fn find(&self) -> Result<Option<RunRecord>> {
        let config = self.project.load_config()?;
        let store = self.project.store(&config);
        match self.args.run_id.as_deref() {
            Some(id) => store.load(&id.parse::<RunId>()?).map(Some),
            None => store.latest(),
        }
    }

    fn show_details(record: &RunRecord, ui: &mut dyn UserInterface) {
        let params = &record.parameters;
        ui.message(&format!("Environment: {}", params.environment));
        ui.message(&format!("Test level:  {}", params.test_level));
        if !params.specified_tests.is_empty() {
            ui.message(&format!("Tests:       {}", params.specified_tests.join(", ")));
        }
        if let Some(tag) = params.release_tag() {
            ui.message(&format!("Version tag: {}", tag));
        }
        if let Some(approval) = &record.approval {
            let state = match &approval.decision {
                Some(decision) => decision.describe(),
                None => format!(
                    "waiting for {} until {}",
                    approval.request.required_role,
                    approval.request.deadline.format("%Y-%m-%d %H:%M UTC")
                ),
            };
            ui.message(&format!("Approval:    {}", state));
        }
        if let Some(ticket) = &record.ticket {
            ui.message(&format!("Ticket:      {}", ticket));
        }
    }

    fn show_output(record: &RunRecord, ui: &mut dyn UserInterface) {
        for stage in record.stages.iter().filter(|s| !s.output.is_empty()) {
            ui.show_header(stage.stage.name());
            for line in stage.output.lines() {
                ui.message(&format!("  {}", line));
            }
        }
    }
}

impl Command for ShowCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let Some(record) = self.find()? else {
            ui.message("No runs recorded for this project.");
            return Ok(CommandResult::success());
        };

        if self.args.json {
            let json = serde_json::to_string_pretty(&record).map_err(anyhow::Error::from)?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("{} · {}", record.id, record.description));
        Self::show_details(&record, ui);
        if self.args.output {
            Self::show_output(&record, ui);
        }
        ui.show_run_summary(&RunSummary::from_record(&record));

        Ok(CommandResult::success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, RunParameters};
    use crate::error::PromoteError;
    use crate::state::{RunStatus, RunStore};
    use crate::steps::{Stage, StageRecorder};
    use crate::ui::MockUI;
    use tempfile::TempDir;

    fn seed(temp: &TempDir) -> RunRecord {
        let store = RunStore::new(&temp.path().join(".sfpromote"));
        let mut record = store.create(RunParameters::new(Environment::Qa)).unwrap();
        let mut recorder = StageRecorder::start(Stage::Initialize);
        recorder.append_output("HEAD is now at 1a2b3c");
        record.push_stage(recorder.finish());
        record.ticket = Some("PROJ-42".to_string());
        record.finish(RunStatus::Success);
        store.save(&record).unwrap();
        record
    }

    fn show(temp: &TempDir, args: ShowArgs) -> (Result<CommandResult>, MockUI) {
        let mut ui = MockUI::new();
        let result = ShowCommand::new(ProjectContext::new(temp.path(), None), args).execute(&mut ui);
        (result, ui)
    }

    #[test]
    fn shows_latest_run_by_default() {
        let temp = TempDir::new().unwrap();
        let record = seed(&temp);

        let (result, ui) = show(&temp, ShowArgs::default());

        assert!(result.unwrap().success);
        assert!(ui.headers()[0].contains(record.id.as_str()));
        assert!(ui.has_message("PROJ-42"));
        assert_eq!(ui.summaries().len(), 1);
        assert!(!ui.has_message("HEAD is now at"));
    }

    #[test]
    fn output_flag_prints_stage_output() {
        let temp = TempDir::new().unwrap();
        let record = seed(&temp);

        let (_, ui) = show(
            &temp,
            ShowArgs {
                run_id: Some(record.id.to_string()),
                output: true,
                ..Default::default()
            },
        );

        assert!(ui.has_message("HEAD is now at 1a2b3c"));
    }

    #[test]
    fn no_runs_yet() {
        let temp = TempDir::new().unwrap();
        let (result, ui) = show(&temp, ShowArgs::default());

        assert!(result.unwrap().success);
        assert!(ui.has_message("No runs recorded"));
    }

    #[test]
    fn unknown_run_is_not_found() {
        let temp = TempDir::new().unwrap();
        seed(&temp);

        let (result, _) = show(
            &temp,
            ShowArgs {
                run_id: Some("run_1_deadbeef".to_string()),
                ..Default::default()
            },
        );

        assert!(matches!(result.unwrap_err(), PromoteError::RunNotFound { .. }));
    }
}
