//! Run command implementation.
//!
//! The `sfpromote run` command promotes the project to one environment.

use std::collections::HashMap;
use std::time::Duration;

use crate::cli::args::RunArgs;
use crate::config::PromoteConfig;
use crate::environment::{Environment, RunParameters, TestLevel};
use crate::error::Result;
use crate::gate::{ApprovalSource, PromptApproval, StoreApproval};
use crate::runner::{PipelineRunner, RunOptions};
use crate::secrets::OutputMasker;
use crate::shell::{OutputLine, ShellRunner};
use crate::state::RunStore;
use crate::steps::plan;
use crate::tracker::tracker_from_config;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectContext};

/// The run command implementation.
pub struct RunCommand {
    project: ProjectContext,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(project: ProjectContext, args: RunArgs) -> Self {
        Self { project, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Parameters for this run, validated.
    ///
    /// # Errors
    ///
    /// Unknown environments or test levels are configuration errors, raised
    /// before anything runs.
    pub fn parameters(&self) -> Result<RunParameters> {
        let environment: Environment = self.args.environment.parse()?;
        let test_level: TestLevel = self.args.test_level.parse()?;

        let mut params = RunParameters::new(environment);
        params.run_tests = self.args.run_tests;
        params.skip_code_analysis = self.args.skip_code_analysis;
        params.deploy_only = self.args.deploy_only;
        params.test_level = test_level;
        params.specified_tests = self
            .args
            .tests
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        params.version_tag = self.args.version_tag.clone();
        params.validated()
    }

    fn show_plan(&self, params: &RunParameters, ui: &mut dyn UserInterface) {
        ui.show_header(&format!("Plan · {}", params.describe()));
        for planned in plan(params) {
            match planned.skip_reason {
                Some(reason) => ui.message(&format!(
                    "  ⊘ {:<28} skipped ({})",
                    planned.stage.name(),
                    reason
                )),
                None => ui.message(&format!("  ● {}", planned.stage.name())),
            }
        }
    }
}

/// Runner whose output is echoed, masked, when the UI is verbose.
pub(crate) fn command_runner(masker: &OutputMasker, ui: &dyn UserInterface) -> ShellRunner {
    if !ui.output_mode().shows_command_output() {
        return ShellRunner::new();
    }

    let masker = masker.clone();
    ShellRunner::with_live_output(move |line| match line {
        OutputLine::Stdout(text) => println!("    {}", masker.mask(&text)),
        OutputLine::Stderr(text) => eprintln!("    {}", masker.mask(&text)),
    })
}

/// Where the approval gate gets its decision.
///
/// Interactive sessions ask at the terminal while still watching the run
/// record. Otherwise the run waits for `sfpromote approve|reject`, or parks
/// immediately when detaching.
pub(crate) fn approval_source(
    config: &PromoteConfig,
    store: RunStore,
    environment: Environment,
    interactive: bool,
    detach: bool,
) -> Box<dyn ApprovalSource> {
    let poll = Duration::from_secs(config.settings.approval_poll_seconds);
    if interactive && !detach {
        let allow_list = config.approval.approvers.for_environment(environment).to_vec();
        return Box::new(PromptApproval::new(allow_list, StoreApproval::new(store, poll)));
    }

    Box::new(StoreApproval::new(store, poll).detached(detach))
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let params = self.parameters()?;
        let config = self.project.load_config()?;

        if self.args.dry_run {
            self.show_plan(&params, ui);
            return Ok(CommandResult::success());
        }

        let env: HashMap<String, String> = std::env::vars().collect();
        let masker = OutputMasker::new();
        let commands = command_runner(&masker, ui);
        let approvals = approval_source(
            &config,
            self.project.store(&config),
            params.environment,
            ui.is_interactive(),
            self.args.detach_approval,
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

        let options = RunOptions {
            break_lock: self.args.break_lock,
        };
        let record = runner.run(params, &options, ui)?;

        Ok(CommandResult::for_run(record.status))
    }
}
