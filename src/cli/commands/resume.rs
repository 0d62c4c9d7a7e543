//! Resume command implementation.
//!
//! Continues a run that was parked at the approval gate, from the gate on.

use std::collections::HashMap;

use crate::cli::args::ResumeArgs;
use crate::error::Result;
use crate::runner::PipelineRunner;
use crate::secrets::OutputMasker;
use crate::state::RunId;
use crate::tracker::tracker_from_config;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectContext};
use super::run::{approval_source, command_runner};

/// The resume command implementation.
pub struct ResumeCommand {
    project: ProjectContext,
    args: ResumeArgs,
}

impl ResumeCommand {
    pub fn new(project: ProjectContext, args: ResumeArgs) -> Self {
        Self { project, args }
    }
}

impl Command for ResumeCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let run_id: RunId = self.args.run_id.parse()?;
        let config = self.project.load_config()?;
        let store = self.project.store(&config);
        let record = store.load(&run_id)?;

        let env: HashMap<String, String> = std::env::vars().collect();
        let masker = OutputMasker::new();
        let commands = command_runner(&masker, ui);
        // Without --wait an undecided run parks again.
        let approvals = approval_source(
            &config,
            store,
            record.parameters.environment,
            false,
            !self.args.wait,
        );
        let tracker = tracker_from_config(&config.tracker, &env, &masker)?;

        let runner = PipelineRunner::new(
            &config,
            &self.project.root,
            &commands,
            approvals.as_ref(),
            tracker.as_ref(),
        )
        .with_env(env)
        .with_masker(masker);

        let record = runner.resume(&run_id, ui)?;
        Ok(CommandResult::for_run(record.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, RunParameters};
    use crate::error::PromoteError;
    use crate::state::{RunStatus, RunStore};
    use crate::ui::MockUI;
    use tempfile::TempDir;

    fn resume(temp: &TempDir, run_id: &str) -> Result<CommandResult> {
        let args = ResumeArgs {
            run_id: run_id.to_string(),
            wait: false,
        };
        ResumeCommand::new(ProjectContext::new(temp.path(), None), args).execute(&mut MockUI::new())
    }

    #[test]
    fn malformed_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = resume(&temp, "nope").unwrap_err();
        assert!(matches!(err, PromoteError::RunNotFound { .. }));
    }

    #[test]
    fn finished_run_cannot_resume() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(&temp.path().join(".sfpromote"));
        let mut record = store
            .create(RunParameters::new(Environment::Qa))
            .unwrap();
        record.finish(RunStatus::Success);
        store.save(&record).unwrap();

        let err = resume(&temp, record.id.as_str()).unwrap_err();

        assert!(matches!(err, PromoteError::InvalidRunState { .. }));
    }
}
