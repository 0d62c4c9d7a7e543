//! Pipeline orchestration.
//!
//! [`PipelineRunner`] walks the stage table for one run, records each
//! [`StageResult`], and always finishes with [`cleanup`](super::cleanup).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{resolve_string, InterpolationContext, PromoteConfig};
use crate::environment::{RunParameters, TestLevel};
use crate::error::{PromoteError, Result};
use crate::gate::{
    breaches, check_coverage, parse_limits, read_coverage, ApprovalOutcome, ApprovalRequest,
    ApprovalSource,
};
use crate::org::{credential_for, read_secret, LoginTarget, OrgSession};
use crate::secrets::OutputMasker;
use crate::shell::{CommandResult, CommandRunner};
use crate::state::{RunId, RunLock, RunRecord, RunStatus, RunStore};
use crate::steps::{Stage, StageRecorder, StageResult, StageStatus};
use crate::tracker::{extract_ticket, ticket_regex, TicketTracker, TicketUpdate};
use crate::ui::{RunSummary, UserInterface};

use super::cleanup::{cleanup, CleanupPlan};
use super::console::ConsoleLog;
use super::invoke::{StageShell, Tolerance};
use super::reports::{
    archive_dir, has_entries, parse_deploy_summary, parse_org_test_summary, write_artifact,
};

/// Options for starting a run.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Remove a stale lock left by a crashed run before starting.
    pub break_lock: bool,
}

/// Executes the promotion pipeline.
pub struct PipelineRunner<'a> {
    config: &'a PromoteConfig,
    project_root: PathBuf,
    store: RunStore,
    commands: &'a dyn CommandRunner,
    approvals: &'a dyn ApprovalSource,
    tracker: &'a dyn TicketTracker,
    env: HashMap<String, String>,
    masker: OutputMasker,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        config: &'a PromoteConfig,
        project_root: &Path,
        commands: &'a dyn CommandRunner,
        approvals: &'a dyn ApprovalSource,
        tracker: &'a dyn TicketTracker,
    ) -> Self {
        Self {
            config,
            project_root: project_root.to_path_buf(),
            store: RunStore::new(&project_root.join(&config.settings.work_dir)),
            commands,
            approvals,
            tracker,
            env: HashMap::new(),
            masker: OutputMasker::new(),
        }
    }

    /// Environment used for credentials, `BUILD_URL` and template variables.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Share a masker with the caller, e.g. one already wired to live output.
    pub fn with_masker(mut self, masker: OutputMasker) -> Self {
        self.masker = masker;
        self
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Start a new run and execute it to completion, or until it detaches
    /// at the approval gate.
    ///
    /// # Errors
    ///
    /// Invalid parameters, a held lock or failing to create the run record
    /// are returned as errors. Everything after that is recorded in the
    /// returned [`RunRecord`].
    pub fn run(
        &self,
        params: RunParameters,
        options: &RunOptions,
        ui: &mut dyn UserInterface,
    ) -> Result<RunRecord> {
        let params = params.validated()?;
        let work_dir = self.store.work_dir();

        if options.break_lock && RunLock::break_lock(work_dir)? {
            ui.warning("Removed an existing run lock");
        }

        let id = RunId::generate(params.environment);
        let _lock = RunLock::acquire(work_dir, &id)?;

        let mut record = RunRecord::new(id, params);
        fs::create_dir_all(self.store.artifacts_dir(&record.id))?;
        record.log_url = Some(self.log_link(&record.id));
        self.store.save(&record)?;

        tracing::info!(
            run_id = %record.id,
            environment = %record.parameters.environment,
            "run started"
        );
        ui.show_header(&format!("sfpromote · {}", record.description));

        let mut execution = self.execution(record);
        execution.walk(Stage::Initialize, ui);
        Ok(execution.finish(ui))
    }

    /// Continue a run that detached at the approval gate.
    ///
    /// The gate is consulted first. Without a decision the run stays parked
    /// and nothing else happens; an approval authorizes the org again, since
    /// cleanup logged out when the run detached.
    pub fn resume(&self, run_id: &RunId, ui: &mut dyn UserInterface) -> Result<RunRecord> {
        let record = self.store.load(run_id)?;
        let request = match (&record.status, &record.approval) {
            (RunStatus::AwaitingApproval, Some(state)) => state.request.clone(),
            _ => {
                return Err(PromoteError::InvalidRunState {
                    run_id: run_id.to_string(),
                    status: record.status.to_string(),
                    message: "only runs waiting for approval can be resumed".to_string(),
                })
            }
        };

        let _lock = RunLock::acquire(self.store.work_dir(), run_id)?;

        tracing::info!(run_id = %record.id, "run resumed");
        ui.show_header(&format!("sfpromote · resuming {}", record.description));

        let outcome = self.approvals.await_decision(&request, ui)?;
        if outcome == ApprovalOutcome::Detached {
            tracing::info!(run_id = %record.id, "still awaiting approval");
            ui.warning(&format!(
                "No decision recorded for {} yet; the run is still waiting",
                record.id
            ));
            return Ok(record);
        }

        let approved = matches!(outcome, ApprovalOutcome::Approved(_));
        let mut execution = self.execution(record);
        execution.decided = Some(outcome);
        execution.shell.console().section("Resume");

        if !approved {
            execution.walk(Stage::Approval, ui);
            return Ok(execution.finish(ui));
        }

        let mut recorder = StageRecorder::start(Stage::AuthorizeOrg);
        match execution.login_target(&mut recorder, ui) {
            Ok(()) => execution.walk(Stage::Approval, ui),
            Err(e) => {
                ui.error(&format!("Could not authorize the org again: {}", e));
                execution.record.error = Some(format!("re-authorization failed: {}", e));
            }
        }
        Ok(execution.finish(ui))
    }

    /// `$BUILD_URL/console` on a CI host, otherwise the local log path.
    fn log_link(&self, id: &RunId) -> String {
        match self.env.get("BUILD_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => format!("{}/console", url.trim_end_matches('/')),
            None => self.store.console_log_path(id).display().to_string(),
        }
    }

    fn execution(&self, record: RunRecord) -> Execution<'_, 'a> {
        let settings = &self.config.settings;
        let run_dir = self.store.run_dir(&record.id);
        let artifacts_dir = self.store.artifacts_dir(&record.id);

        let console = ConsoleLog::open(&self.store.console_log_path(&record.id), &self.masker);
        let shell = StageShell::new(
            self.commands,
            &self.project_root,
            settings.command_timeout_secs(),
            self.masker.clone(),
            console,
            settings.mark_unstable_on_tolerated_failure,
        );
        let session = OrgSession::new(&self.config.org.alias, &run_dir.join("auth"));

        let params = &record.parameters;
        // Class names are validated identifiers, so the fragment needs no quoting.
        let tests_arg: String = if params.test_level == TestLevel::RunSpecifiedTests {
            params
                .specified_tests
                .iter()
                .map(|test| format!(" --tests {}", test))
                .collect()
        } else {
            String::new()
        };

        let path = |p: &Path| p.to_string_lossy().into_owned();
        let mut context = InterpolationContext::new().with_env(self.env.clone());
        context.set("org_alias", session.alias());
        context.set("devhub_alias", session.devhub_alias());
        context.set("environment", params.environment.name());
        context.set("test_level", params.test_level.name());
        context.set_fragment("tests_arg", tests_arg);
        context.set("version_tag", params.version_tag.clone().unwrap_or_default());
        context.set("run_id", record.id.as_str());
        context.set("run_dir", path(&run_dir));
        context.set("artifacts_dir", path(&artifacts_dir));
        context.set("reports_dir", path(&artifacts_dir.join("reports")));
        context.set("test_results_dir", path(&artifacts_dir.join("test-results")));
        context.set("backup_dir", path(&artifacts_dir.join("backup")));
        context.set("project_root", path(&self.project_root));

        Execution {
            runner: self,
            config: self.config,
            record,
            shell,
            session,
            context,
            run_dir,
            artifacts_dir,
            detached: false,
            decided: None,
        }
    }
}

/// What the walk does after a stage.
enum Flow {
    Next,
    Stop,
    Detach,
}

/// State of one run while its stages execute.
struct Execution<'p, 'a> {
    runner: &'p PipelineRunner<'a>,
    config: &'a PromoteConfig,
    record: RunRecord,
    shell: StageShell<'a>,
    session: OrgSession,
    context: InterpolationContext,
    run_dir: PathBuf,
    artifacts_dir: PathBuf,
    detached: bool,
    /// Gate outcome obtained before the walk, when resuming.
    decided: Option<ApprovalOutcome>,
}

impl Execution<'_, '_> {
    /// Execute stages from `from` onwards.
    fn walk(&mut self, from: Stage, ui: &mut dyn UserInterface) {
        let all = Stage::ALL;
        let total = all.len();
        let stages = all
            .iter()
            .copied()
            .enumerate()
            .skip_while(|(_, stage)| *stage != from);

        for (index, stage) in stages {
            let label = format!("[{}/{}] {}", index + 1, total, stage.name());

            let flow = match stage.skip_reason(&self.record.parameters) {
                Some(reason) => {
                    tracing::info!(stage = stage.slug(), reason, "stage skipped");
                    ui.message(&format!("{} skipped ({})", label, reason));
                    self.record.push_stage(StageResult::skipped(stage, reason));
                    Flow::Next
                }
                None => self.run_stage(stage, &label, ui),
            };

            if let Err(e) = self.runner.store.save(&self.record) {
                tracing::error!(run_id = %self.record.id, "cannot save run record: {}", e);
                self.record.error = Some(format!("cannot save run record: {}", e));
                return;
            }

            match flow {
                Flow::Next => {}
                Flow::Stop => return,
                Flow::Detach => {
                    self.detached = true;
                    return;
                }
            }
        }
    }

    fn run_stage(&mut self, stage: Stage, label: &str, ui: &mut dyn UserInterface) -> Flow {
        tracing::info!(stage = stage.slug(), run_id = %self.record.id, "stage started");
        self.shell.console().section(stage.name());

        let mut recorder = StageRecorder::start(stage);
        let mut spinner = if stage == Stage::Approval {
            ui.message(label);
            None
        } else {
            Some(ui.start_spinner(label))
        };

        let detach = match self.stage_body(stage, &mut recorder, ui) {
            Ok(detach) => detach,
            Err(e) => {
                let message = match e {
                    PromoteError::StageFailed { message, .. } => message,
                    other => other.to_string(),
                };
                recorder.mark_failed(message);
                false
            }
        };

        if detach {
            if let Some(spinner) = spinner.as_mut() {
                spinner.finish_skipped(label);
            }
            return Flow::Detach;
        }

        let result = recorder.finish();
        let line = match &result.message {
            Some(message) => format!("{} · {}", label, message),
            None => label.to_string(),
        };
        match (spinner.as_mut(), result.status) {
            (Some(spinner), StageStatus::Failed | StageStatus::Aborted) => {
                spinner.finish_error(&line)
            }
            (Some(spinner), _) => spinner.finish_success(&line),
            (None, StageStatus::Failed | StageStatus::Aborted) => ui.error(&line),
            (None, StageStatus::Unstable) => ui.warning(&line),
            (None, _) => ui.success(&line),
        }

        tracing::info!(
            stage = stage.slug(),
            status = %result.status,
            duration_ms = result.duration_ms,
            "stage finished"
        );

        let flow = if result.status.allows_continue() {
            Flow::Next
        } else {
            Flow::Stop
        };
        self.record.push_stage(result);
        flow
    }

    /// Returns `true` when the run detaches at this stage.
    fn stage_body(
        &mut self,
        stage: Stage,
        rec: &mut StageRecorder,
        ui: &mut dyn UserInterface,
    ) -> Result<bool> {
        match stage {
            Stage::Initialize => self.initialize(rec, ui)?,
            Stage::SetupDependencies => {
                let command = self.resolve(&self.config.commands.install)?;
                self.shell
                    .exec(rec, ui, "dependency install", &command, Tolerance::Fatal)?;
            }
            Stage::CodeQuality => self.code_quality(rec, ui)?,
            Stage::UnitTests => self.unit_tests(rec, ui)?,
            Stage::AuthorizeOrg => {
                self.login_target(rec, ui)?;
                self.login_devhub(rec, ui)?;
            }
            Stage::ValidateDeployment => {
                let command = self.resolve(&self.config.commands.validate)?;
                let result = self.shell.run(&command);
                self.archive_payload(rec, &result, "validate-result.json");
                self.shell
                    .check(rec, ui, "validation", &command, &result, Tolerance::Fatal)?;
            }
            Stage::OrgTests => self.org_tests(rec, ui)?,
            Stage::Approval => return self.approval(rec, ui),
            Stage::Deploy => self.deploy(rec, ui)?,
            Stage::PostDeployValidation => self.post_deploy_validation(rec, ui)?,
            Stage::UpdateTicket => self.update_ticket(rec, ui)?,
            Stage::ReleaseTag => self.release_tag(rec, ui)?,
        }
        Ok(false)
    }

    fn resolve(&self, template: &str) -> Result<String> {
        resolve_string(template, &self.context)
    }

    /// Resolve an optional command; blank templates are not configured.
    fn optional(&self, template: &str) -> Result<Option<String>> {
        if template.trim().is_empty() {
            return Ok(None);
        }
        self.resolve(template).map(Some)
    }

    /// A failure that does not stop the run.
    fn tolerate(&self, rec: &mut StageRecorder, ui: &mut dyn UserInterface, note: String) {
        ui.warning(&note);
        tracing::warn!(stage = rec.stage().slug(), "{}", note);
        if self.config.settings.mark_unstable_on_tolerated_failure {
            rec.mark_unstable(note);
        } else {
            rec.note(note);
        }
    }

    fn initialize(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let config = self.config;

        if let Some(checkout) = &config.commands.checkout {
            let command = self.resolve(checkout)?;
            self.shell
                .exec(rec, ui, "checkout", &command, Tolerance::Fatal)?;
        }

        for probe in &config.commands.versions {
            let command = self.resolve(probe)?;
            self.shell
                .exec(rec, ui, &command, &command, Tolerance::Tolerated)?;
        }

        let description = format!("{} ({})", self.record.description, self.record.id);
        self.shell.console().line(&description);
        rec.note(description);
        Ok(())
    }

    fn code_quality(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let commands = &self.config.commands;
        let checks = [
            ("format check", &commands.format_check),
            ("lint", &commands.lint),
            ("static analysis", &commands.static_analysis),
            ("vulnerability scan", &commands.vulnerability_scan),
            ("license check", &commands.license_check),
        ];

        let reports_dir = self.artifacts_dir.join("reports");
        fs::create_dir_all(&reports_dir)?;

        let mut resolved = Vec::with_capacity(checks.len());
        for (label, template) in checks {
            resolved.push((label, self.optional(template)?.unwrap_or_default()));
        }

        let results = self.shell.run_parallel(&resolved);
        for ((label, command), result) in resolved.iter().zip(results) {
            match result {
                Some(result) => {
                    self.shell
                        .check(rec, ui, label, command, &result, Tolerance::Tolerated)?
                }
                None => rec.note(format!("{} not configured", label)),
            }
        }

        if has_entries(&reports_dir) {
            rec.artifact(PathBuf::from("reports"));
        }
        Ok(())
    }

    fn unit_tests(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let coverage = &self.config.coverage;
        let root = &self.runner.project_root;

        let command = self.resolve(&self.config.commands.unit_tests)?;
        let result = self.shell.run(&command);

        match archive_dir(&root.join(&coverage.report_dir), &self.artifacts_dir, "coverage") {
            Ok(Some(path)) => rec.artifact(path),
            Ok(None) => {}
            Err(e) => tracing::warn!("cannot archive coverage report: {}", e),
        }

        self.shell
            .check(rec, ui, "unit tests", &command, &result, Tolerance::Fatal)?;

        let measured = read_coverage(&root.join(&coverage.summary_path), coverage.metric)?;
        rec.note(format!(
            "{} coverage {:.1}% (minimum {:.1}%)",
            coverage.metric.key(),
            measured,
            coverage.minimum
        ));
        check_coverage(measured, coverage.minimum)
    }

    /// Log in to the target org. Any failure is fatal.
    fn login_target(
        &mut self,
        rec: &mut StageRecorder,
        ui: &mut dyn UserInterface,
    ) -> Result<()> {
        let config = self.config;
        let environment = self.record.parameters.environment;
        let credential = credential_for(config, environment);
        let secret = read_secret(credential, &self.runner.env)?;
        self.shell.masker().add_auth_url(&secret);

        let (result, command) = self.login(LoginTarget::Target, credential, &secret)?;
        self.shell
            .check(rec, ui, "org login", &command, &result, Tolerance::Fatal)?;

        tracing::info!(environment = %environment, alias = self.session.alias(), "org authorized");
        rec.note(format!("authorized as {}", self.session.alias()));
        Ok(())
    }

    /// Log in to the dev hub when one is configured. Failures are tolerated.
    fn login_devhub(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let config = self.config;
        let Some(credential) = config.org.devhub_credential.as_deref() else {
            return Ok(());
        };

        let secret = match read_secret(credential, &self.runner.env) {
            Ok(secret) => secret,
            Err(e) => {
                self.tolerate(rec, ui, format!("dev hub not authorized: {}", e));
                return Ok(());
            }
        };
        self.shell.masker().add_auth_url(&secret);

        match self.login(LoginTarget::DevHub, credential, &secret) {
            Ok((result, command)) => {
                self.shell
                    .check(rec, ui, "dev hub login", &command, &result, Tolerance::Tolerated)?;
            }
            Err(e) => self.tolerate(rec, ui, format!("dev hub not authorized: {}", e)),
        }
        Ok(())
    }

    fn login(
        &mut self,
        target: LoginTarget,
        credential: &str,
        secret: &str,
    ) -> Result<(CommandResult, String)> {
        let template = match target {
            LoginTarget::Target => &self.config.commands.login,
            LoginTarget::DevHub => &self.config.commands.devhub_login,
        };

        let shell = &mut self.shell;
        let mut ran = String::new();
        let result = self.session.login(
            target,
            credential,
            secret,
            template,
            &self.context,
            |command| {
                ran = command.to_string();
                Ok(shell.run(command))
            },
        )?;
        Ok((result, ran))
    }

    fn org_tests(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let results_dir = self.artifacts_dir.join("test-results");
        fs::create_dir_all(&results_dir)?;

        let command = self.resolve(&self.config.commands.org_tests)?;
        let result = self.shell.run(&command);

        if let Some(summary) = parse_org_test_summary(&result.stdout) {
            rec.note(summary.describe());
        }
        if has_entries(&results_dir) {
            rec.artifact(PathBuf::from("test-results"));
        }

        self.shell
            .check(rec, ui, "org tests", &command, &result, Tolerance::Fatal)
    }

    /// Archive the JSON printed by a deploy command and report its outcome.
    fn archive_payload(&self, rec: &mut StageRecorder, result: &CommandResult, name: &str) {
        let Some(payload) = result.json_payload() else {
            return;
        };

        match write_artifact(&self.artifacts_dir, name, payload) {
            Ok(path) => rec.artifact(path),
            Err(e) => tracing::warn!("cannot archive {}: {}", name, e),
        }
        if let Some(summary) = parse_deploy_summary(payload).and_then(|s| s.describe()) {
            rec.note(summary);
        }
    }

    fn approval(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<bool> {
        let request = match &self.record.approval {
            Some(state) => state.request.clone(),
            None => {
                let environment = self.record.parameters.environment;
                let minutes =
                    i64::try_from(self.config.settings.approval_timeout_minutes).unwrap_or(i64::MAX);
                let timeout =
                    chrono::Duration::try_minutes(minutes).unwrap_or(chrono::Duration::MAX);
                let Some(request) = ApprovalRequest::new(self.record.id.clone(), environment, timeout)
                else {
                    rec.note("no approval required");
                    return Ok(false);
                };
                self.record.await_approval(request.clone());
                self.runner.store.save(&self.record)?;
                request
            }
        };

        tracing::info!(
            run_id = %request.run_id,
            environment = %request.environment,
            role = request.required_role.name(),
            "awaiting approval"
        );
        ui.warning(&format!(
            "Deployment to {} needs {} approval: sfpromote approve {} --approver NAME --role {}",
            request.environment,
            request.required_role,
            request.run_id,
            request.required_role.name()
        ));

        let outcome = match self.decided.take() {
            Some(outcome) => outcome,
            None => self.runner.approvals.await_decision(&request, ui)?,
        };

        let decision = match outcome {
            ApprovalOutcome::Detached => {
                tracing::info!(run_id = %request.run_id, "detached at approval gate");
                return Ok(true);
            }
            ApprovalOutcome::Approved(decision) => {
                rec.note(decision.describe());
                Some(decision)
            }
            ApprovalOutcome::Rejected(decision) => {
                rec.mark_aborted(decision.describe());
                Some(decision)
            }
            ApprovalOutcome::TimedOut => {
                rec.mark_aborted(format!(
                    "no decision within {} minutes",
                    self.config.settings.approval_timeout_minutes
                ));
                None
            }
        };

        if let (Some(state), Some(decision)) = (self.record.approval.as_mut(), decision) {
            state.decision = Some(decision);
        }
        self.record.status = RunStatus::Running;
        Ok(false)
    }

    fn deploy(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let environment = self.record.parameters.environment;

        if environment.backs_up_before_deploy() {
            let backup_dir = self.artifacts_dir.join("backup");
            fs::create_dir_all(&backup_dir)?;
            match self.optional(&self.config.commands.backup)? {
                Some(command) => {
                    self.shell
                        .exec(rec, ui, "backup", &command, Tolerance::Tolerated)?;
                    if has_entries(&backup_dir) {
                        rec.artifact(PathBuf::from("backup"));
                    }
                }
                None => rec.note("backup not configured"),
            }
        }

        let command = self.resolve(&self.config.commands.deploy)?;
        let result = self.shell.run(&command);
        self.archive_payload(rec, &result, "deploy-result.json");
        self.shell
            .check(rec, ui, "deploy", &command, &result, Tolerance::Fatal)
    }

    fn post_deploy_validation(
        &mut self,
        rec: &mut StageRecorder,
        ui: &mut dyn UserInterface,
    ) -> Result<()> {
        let Some(command) = self.optional(&self.config.commands.limits)? else {
            rec.note("limits check not configured");
            return Ok(());
        };

        let result = self
            .shell
            .exec(rec, ui, "limits query", &command, Tolerance::Tolerated)?;
        if !result.success {
            return Ok(());
        }

        if let Some(payload) = result.json_payload() {
            match write_artifact(&self.artifacts_dir, "limits.json", payload) {
                Ok(path) => rec.artifact(path),
                Err(e) => tracing::warn!("cannot archive org limits: {}", e),
            }
        }

        match parse_limits(&result.stdout) {
            Ok(limits) => {
                let breached = breaches(&limits);
                if breached.is_empty() {
                    rec.note(format!("{} org limits within quota", limits.len()));
                } else {
                    let names: Vec<&str> = breached.iter().map(|l| l.name.as_str()).collect();
                    let note = format!("org limits exhausted: {}", names.join(", "));
                    ui.warning(&note);
                    tracing::warn!(stage = rec.stage().slug(), "{}", note);
                    rec.mark_unstable(note);
                }
            }
            Err(e) => {
                let message = match e {
                    PromoteError::StageFailed { message, .. } => message,
                    other => other.to_string(),
                };
                self.tolerate(rec, ui, message);
            }
        }
        Ok(())
    }

    fn update_ticket(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let tracker_config = &self.config.tracker;
        let pattern = match ticket_regex(&tracker_config.ticket_pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                self.tolerate(rec, ui, e.to_string());
                return Ok(());
            }
        };

        let Some(command) = self.optional(&self.config.commands.last_commit_message)? else {
            rec.note("commit message lookup not configured");
            return Ok(());
        };
        let result = self.shell.exec(
            rec,
            ui,
            "commit message lookup",
            &command,
            Tolerance::Tolerated,
        )?;
        if !result.success {
            return Ok(());
        }

        let Some(ticket) = extract_ticket(&result.stdout, &pattern) else {
            rec.note("no ticket id in the latest commit message");
            return Ok(());
        };

        let log_link = self.record.log_url.clone().unwrap_or_default();
        let update = TicketUpdate::new(
            &ticket,
            self.record.parameters.environment,
            &tracker_config.states,
            self.record.id.as_str(),
            &log_link,
        );

        let tracker = self.runner.tracker;
        match tracker.apply(&update) {
            Ok(()) => rec.note(format!(
                "{} moved to '{}' ({})",
                ticket,
                update.state,
                tracker.name()
            )),
            Err(e) => self.tolerate(rec, ui, format!("ticket {} not updated: {}", ticket, e)),
        }
        self.record.ticket = Some(ticket);
        Ok(())
    }

    fn release_tag(&mut self, rec: &mut StageRecorder, ui: &mut dyn UserInterface) -> Result<()> {
        let Some(tag) = self.record.parameters.release_tag().map(str::to_string) else {
            rec.note("no version tag");
            return Ok(());
        };

        let command = self.resolve(&self.config.commands.tag)?;
        self.shell
            .exec(rec, ui, "tag", &command, Tolerance::Fatal)?;

        match self.optional(&self.config.commands.push_tag)? {
            Some(command) => {
                self.shell
                    .exec(rec, ui, "tag push", &command, Tolerance::Fatal)?;
                rec.note(format!("tagged and pushed {}", tag));
            }
            None => rec.note(format!("tagged {} (push not configured)", tag)),
        }
        Ok(())
    }

    /// Clean up and seal the record. Consumes the execution, so cleanup
    /// happens exactly once.
    fn finish(mut self, ui: &mut dyn UserInterface) -> RunRecord {
        let settings = &self.config.settings;
        let plan = CleanupPlan {
            logout: &self.config.commands.logout,
            context: &self.context,
            credential_dir: &self.run_dir.join("auth"),
            project_root: &self.runner.project_root,
            ephemeral_dirs: &settings.ephemeral_dirs,
        };
        let report = cleanup(&plan, &mut self.session, &mut self.shell, ui);
        tracing::debug!(
            credential_files = report.credential_files_removed,
            dirs = report.dirs_removed.len(),
            "cleanup finished"
        );

        let mut record = self.record;
        if !self.detached {
            let status = if record.error.is_some() {
                RunStatus::Failure
            } else {
                record.stage_outcome()
            };
            record.finish(status);
        }

        let store = &self.runner.store;
        if let Err(e) = store.save(&record) {
            tracing::error!(run_id = %record.id, "cannot save run record: {}", e);
            ui.error(&format!("Could not save run record: {}", e));
        }
        if let Err(e) = store.prune(settings.history_retention) {
            tracing::warn!("cannot prune run history: {}", e);
        }

        tracing::info!(run_id = %record.id, status = %record.status, "run finished");
        ui.show_run_summary(&RunSummary::from_record(&record));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{ApproverRole, Environment};
    use crate::gate::ApprovalDecision;
    use crate::shell::CommandOptions;
    use crate::ui::MockUI;
    use std::cell::RefCell;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const AUTH_URL: &str = "force://PlatformCLI::5Aep861secret@example.my.salesforce.com";

    /// Records every command and fails the ones containing a configured
    /// marker.
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
        failing: Vec<&'static str>,
        stdout: Vec<(&'static str, String)>,
    }

    impl Recording {
        fn failing(markers: &[&'static str]) -> Self {
            Self {
                failing: markers.to_vec(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn ran(&self, marker: &str) -> bool {
            self.count(marker) > 0
        }

        fn count(&self, marker: &str) -> usize {
            self.calls().iter().filter(|c| c.starts_with(marker)).count()
        }
    }

    impl CommandRunner for Recording {
        fn run(&self, command: &str, _options: &CommandOptions) -> Result<CommandResult> {
            self.calls.lock().unwrap().push(command.to_string());
            if self.failing.iter().any(|m| command.starts_with(m)) {
                return Ok(CommandResult::failure(
                    Some(1),
                    String::new(),
                    format!("{} failed", command),
                    Duration::ZERO,
                ));
            }
            let stdout = self
                .stdout
                .iter()
                .find(|(m, _)| command.starts_with(m))
                .map(|(_, out)| out.clone())
                .unwrap_or_default();
            Ok(CommandResult::success(stdout, String::new(), Duration::ZERO))
        }
    }

    struct FixedApproval {
        outcome: RefCell<Option<ApprovalOutcome>>,
        asked: RefCell<usize>,
    }

    impl FixedApproval {
        fn new(outcome: ApprovalOutcome) -> Self {
            Self {
                outcome: RefCell::new(Some(outcome)),
                asked: RefCell::new(0),
            }
        }

        fn asked(&self) -> usize {
            *self.asked.borrow()
        }
    }

    impl ApprovalSource for FixedApproval {
        fn await_decision(
            &self,
            _request: &ApprovalRequest,
            _ui: &mut dyn UserInterface,
        ) -> Result<ApprovalOutcome> {
            *self.asked.borrow_mut() += 1;
            Ok(self
                .outcome
                .borrow_mut()
                .take()
                .unwrap_or(ApprovalOutcome::TimedOut))
        }
    }

    #[derive(Default)]
    struct RecordingTracker {
        updates: RefCell<Vec<TicketUpdate>>,
    }

    impl TicketTracker for RecordingTracker {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn apply(&self, update: &TicketUpdate) -> Result<()> {
            self.updates.borrow_mut().push(update.clone());
            Ok(())
        }
    }

    fn test_config() -> PromoteConfig {
        let mut config = PromoteConfig::default();
        let c = &mut config.commands;
        c.checkout = None;
        c.versions = vec!["version".to_string()];
        c.install = "install".to_string();
        c.format_check = "format".to_string();
        c.lint = "lint".to_string();
        c.static_analysis = "scan".to_string();
        c.vulnerability_scan = "audit".to_string();
        c.license_check = String::new();
        c.unit_tests = "unit".to_string();
        c.login = "login ${auth_file} ${org_alias}".to_string();
        c.validate = "validate ${test_level}${tests_arg}".to_string();
        c.org_tests = "orgtests".to_string();
        c.backup = "backup ${backup_dir}".to_string();
        c.deploy = "deploy ${test_level}".to_string();
        c.limits = "limits".to_string();
        c.last_commit_message = "commitmsg".to_string();
        c.tag = "tag ${version_tag}".to_string();
        c.push_tag = "push ${version_tag}".to_string();
        c.logout = "logout ${org_alias}".to_string();
        config.settings.ephemeral_dirs = Vec::new();
        config
    }

    fn env() -> HashMap<String, String> {
        ["DEV", "QA", "UAT", "PROD"]
            .iter()
            .map(|e| (format!("SFDX_AUTH_URL_{}", e), AUTH_URL.to_string()))
            .collect()
    }

    fn write_coverage(root: &Path, pct: f64) {
        let dir = root.join("coverage");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("coverage-summary.json"),
            format!(r#"{{"total":{{"lines":{{"total":100,"covered":{0},"skipped":0,"pct":{0}}}}}}}"#, pct),
        )
        .unwrap();
    }

    struct Fixture {
        temp: TempDir,
        config: PromoteConfig,
        commands: Recording,
        approvals: FixedApproval,
        tracker: RecordingTracker,
    }

    impl Fixture {
        fn new(mut commands: Recording) -> Self {
            commands
                .stdout
                .push(("limits", r#"{"status":0,"result":[]}"#.to_string()));
            let temp = TempDir::new().unwrap();
            write_coverage(temp.path(), 90.0);
            Self {
                temp,
                config: test_config(),
                commands,
                approvals: FixedApproval::new(ApprovalOutcome::Approved(
                    ApprovalDecision::approve("Dana", ApproverRole::ReleaseManager, None),
                )),
                tracker: RecordingTracker::default(),
            }
        }

        fn runner(&self) -> PipelineRunner<'_> {
            PipelineRunner::new(
                &self.config,
                self.temp.path(),
                &self.commands,
                &self.approvals,
                &self.tracker,
            )
            .with_env(env())
        }

        fn run(&self, params: RunParameters) -> (RunRecord, MockUI) {
            let mut ui = MockUI::new();
            let record = self
                .runner()
                .run(params, &RunOptions::default(), &mut ui)
                .unwrap();
            (record, ui)
        }
    }

    fn status_of(record: &RunRecord, stage: Stage) -> StageStatus {
        record.stage_result(stage).unwrap().status
    }

    #[test]
    fn qa_run_executes_every_stage_in_order() {
        let fixture = Fixture::new(Recording::default());
        let (record, ui) = fixture.run(RunParameters::new(Environment::Qa));

        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(record.stages.len(), Stage::ALL.len());
        let order: Vec<Stage> = record.stages.iter().map(|r| r.stage).collect();
        assert_eq!(order, Stage::ALL.to_vec());
        assert_eq!(status_of(&record, Stage::Approval), StageStatus::Skipped);
        assert_eq!(status_of(&record, Stage::ReleaseTag), StageStatus::Skipped);
        assert!(fixture.commands.ran("validate RunLocalTests"));
        assert_eq!(fixture.approvals.asked(), 0);
        assert_eq!(ui.summaries().len(), 1);
    }

    #[test]
    fn deploy_only_never_invokes_build_stages() {
        let fixture = Fixture::new(Recording::default());
        let mut params = RunParameters::new(Environment::Qa);
        params.deploy_only = true;

        let (record, _) = fixture.run(params);

        for stage in [Stage::SetupDependencies, Stage::CodeQuality, Stage::UnitTests] {
            assert_eq!(status_of(&record, stage), StageStatus::Skipped);
        }
        for marker in ["install", "format", "lint", "scan", "audit", "unit", "orgtests"] {
            assert!(!fixture.commands.ran(marker), "{} should not run", marker);
        }
        assert!(fixture.commands.ran("deploy"));
    }

    #[test]
    fn dev_skips_validation_but_deploys_and_checks_limits() {
        let fixture = Fixture::new(Recording::default());
        let (record, _) = fixture.run(RunParameters::new(Environment::Dev));

        assert_eq!(status_of(&record, Stage::ValidateDeployment), StageStatus::Skipped);
        assert!(!fixture.commands.ran("validate"));
        assert!(fixture.commands.ran("deploy"));
        assert!(fixture.commands.ran("limits"));
        assert!(!fixture.commands.ran("backup"));
    }

    #[test]
    fn production_waits_for_approval_before_deploy() {
        let fixture = Fixture::new(Recording::default());
        let (record, _) = fixture.run(RunParameters::new(Environment::Production));

        assert_eq!(fixture.approvals.asked(), 1);
        assert_eq!(status_of(&record, Stage::Approval), StageStatus::Success);
        let decision = record.approval.unwrap().decision.unwrap();
        assert_eq!(decision.approver, "Dana");
        assert!(fixture.commands.ran("backup"));
        assert_eq!(record.status, RunStatus::Success);
    }

    #[test]
    fn rejection_aborts_before_deploy() {
        let mut fixture = Fixture::new(Recording::default());
        fixture.approvals = FixedApproval::new(ApprovalOutcome::Rejected(
            ApprovalDecision::reject("Dana", Some("not today".to_string())),
        ));

        let (record, _) = fixture.run(RunParameters::new(Environment::Uat));

        assert_eq!(record.status, RunStatus::Aborted);
        assert_eq!(status_of(&record, Stage::Approval), StageStatus::Aborted);
        assert!(record.stage_result(Stage::Deploy).is_none());
        assert!(!fixture.commands.ran("deploy"));
        assert_eq!(fixture.commands.count("logout"), 1);
    }

    #[test]
    fn approval_timeout_aborts() {
        let mut fixture = Fixture::new(Recording::default());
        fixture.approvals = FixedApproval::new(ApprovalOutcome::TimedOut);

        let (record, _) = fixture.run(RunParameters::new(Environment::Uat));

        assert_eq!(record.status, RunStatus::Aborted);
        assert_eq!(record.status.exit_code(), 3);
        assert!(!fixture.commands.ran("deploy"));
    }

    #[test]
    fn low_coverage_fails_before_authorize() {
        let fixture = Fixture::new(Recording::default());
        write_coverage(fixture.temp.path(), 70.0);

        let (record, _) = fixture.run(RunParameters::new(Environment::Qa));

        assert_eq!(record.status, RunStatus::Failure);
        assert_eq!(status_of(&record, Stage::UnitTests), StageStatus::Failed);
        assert!(record.stage_result(Stage::AuthorizeOrg).is_none());
        assert!(!fixture.commands.ran("login"));
        assert!(record
            .stage_result(Stage::UnitTests)
            .unwrap()
            .artifacts
            .contains(&PathBuf::from("coverage")));
        assert_eq!(fixture.commands.count("logout"), 1);
    }

    #[test]
    fn release_tag_only_with_version_on_production() {
        let fixture = Fixture::new(Recording::default());
        let (record, _) = fixture.run(RunParameters::new(Environment::Production));
        assert_eq!(status_of(&record, Stage::ReleaseTag), StageStatus::Skipped);
        assert!(!fixture.commands.ran("tag"));

        let fixture = Fixture::new(Recording::default());
        let mut params = RunParameters::new(Environment::Production);
        params.version_tag = Some("v1.2.3".to_string());
        let (record, _) = fixture.run(params);

        assert_eq!(status_of(&record, Stage::ReleaseTag), StageStatus::Success);
        let calls = fixture.commands.calls();
        let deploy = calls.iter().position(|c| c.starts_with("deploy")).unwrap();
        let tag = calls.iter().position(|c| c == "tag v1.2.3").unwrap();
        let push = calls.iter().position(|c| c == "push v1.2.3").unwrap();
        assert!(deploy < tag && tag < push);
    }

    #[test]
    fn fatal_failure_stops_run_and_still_cleans_up_once() {
        let fixture = Fixture::new(Recording::failing(&["deploy"]));
        let (record, ui) = fixture.run(RunParameters::new(Environment::Qa));

        assert_eq!(record.status, RunStatus::Failure);
        assert_eq!(record.failed_stage().unwrap().stage, Stage::Deploy);
        assert!(record.stage_result(Stage::PostDeployValidation).is_none());
        assert!(!fixture.commands.ran("limits"));
        assert_eq!(fixture.commands.count("logout"), 1);
        assert_eq!(ui.error_blocks().len(), 1);
    }

    #[test]
    fn tolerated_failure_makes_run_unstable() {
        let fixture = Fixture::new(Recording::failing(&["lint"]));
        let (record, ui) = fixture.run(RunParameters::new(Environment::Qa));

        assert_eq!(record.status, RunStatus::Unstable);
        assert_eq!(status_of(&record, Stage::CodeQuality), StageStatus::Unstable);
        assert!(ui.has_warning("lint failed"));
        assert!(fixture.commands.ran("deploy"));
    }

    #[test]
    fn missing_credential_fails_authorize() {
        let fixture = Fixture::new(Recording::default());
        let mut ui = MockUI::new();
        let record = fixture
            .runner()
            .with_env(HashMap::new())
            .run(RunParameters::new(Environment::Qa), &RunOptions::default(), &mut ui)
            .unwrap();

        assert_eq!(record.status, RunStatus::Failure);
        let authorize = record.stage_result(Stage::AuthorizeOrg).unwrap();
        assert_eq!(authorize.status, StageStatus::Failed);
        assert!(authorize.message.as_deref().unwrap().contains("SFDX_AUTH_URL_QA"));
        assert!(!fixture.commands.ran("login"));
        assert_eq!(fixture.commands.count("logout"), 1);
    }

    #[test]
    fn auth_url_never_reaches_record_or_log() {
        let fixture = Fixture::new(Recording::default());
        let (record, _) = fixture.run(RunParameters::new(Environment::Dev));

        let store = fixture.runner().store().clone();
        let saved = std::fs::read_to_string(store.record_path(&record.id)).unwrap();
        let log = std::fs::read_to_string(store.console_log_path(&record.id)).unwrap();
        assert!(!saved.contains("5Aep861secret"));
        assert!(!log.contains("5Aep861secret"));
        assert!(!store.run_dir(&record.id).join("auth").exists());
    }

    #[test]
    fn second_run_is_rejected_while_locked() {
        let fixture = Fixture::new(Recording::default());
        let runner = fixture.runner();
        let holder = RunId::generate(Environment::Dev);
        let _lock = RunLock::acquire(runner.store().work_dir(), &holder).unwrap();

        let err = runner
            .run(
                RunParameters::new(Environment::Dev),
                &RunOptions::default(),
                &mut MockUI::new(),
            )
            .unwrap_err();

        assert!(matches!(err, PromoteError::RunInProgress { .. }));
        assert!(fixture.commands.calls().is_empty());
    }

    #[test]
    fn ticket_is_moved_for_environment() {
        let mut commands = Recording::default();
        commands
            .stdout
            .push(("commitmsg", "CRM-42: tidy triggers\n".to_string()));
        let fixture = Fixture::new(commands);

        let (record, _) = fixture.run(RunParameters::new(Environment::Qa));

        assert_eq!(record.ticket.as_deref(), Some("CRM-42"));
        let updates = fixture.tracker.updates.borrow();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].state, "Testing");
    }

    #[test]
    fn exhausted_limit_is_unstable() {
        let mut commands = Recording::default();
        commands.stdout.push((
            "limits",
            r#"{"status":0,"result":[{"name":"DailyApiRequests","max":15000,"remaining":0}]}"#
                .to_string(),
        ));
        let fixture = Fixture::new(commands);

        let (record, _) = fixture.run(RunParameters::new(Environment::Dev));

        assert_eq!(status_of(&record, Stage::PostDeployValidation), StageStatus::Unstable);
        assert_eq!(record.status, RunStatus::Unstable);
    }

    #[test]
    fn detached_run_resumes_after_approval() {
        let mut fixture = Fixture::new(Recording::default());
        fixture.approvals = FixedApproval::new(ApprovalOutcome::Detached);

        let (parked, _) = fixture.run(RunParameters::new(Environment::Production));
        assert_eq!(parked.status, RunStatus::AwaitingApproval);
        assert_eq!(parked.status.exit_code(), 4);
        assert!(!fixture.commands.ran("deploy"));
        assert_eq!(fixture.commands.count("logout"), 1);

        let runner = fixture.runner();
        runner
            .store()
            .record_decision(
                &parked.id,
                ApprovalDecision::approve("Dana", ApproverRole::ReleaseManager, None),
            )
            .unwrap();

        // A decision is already recorded, so resuming goes straight through.
        *fixture.approvals.outcome.borrow_mut() = Some(ApprovalOutcome::Approved(
            ApprovalDecision::approve("Dana", ApproverRole::ReleaseManager, None),
        ));
        let record = runner.resume(&parked.id, &mut MockUI::new()).unwrap();

        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(fixture.commands.count("login"), 2);
        assert!(fixture.commands.ran("deploy"));
        assert_eq!(fixture.commands.count("logout"), 2);
        assert_eq!(
            record.stages.iter().filter(|r| r.stage == Stage::Approval).count(),
            1
        );
    }

    #[test]
    fn only_parked_runs_resume() {
        let fixture = Fixture::new(Recording::default());
        let (record, _) = fixture.run(RunParameters::new(Environment::Dev));

        let err = fixture
            .runner()
            .resume(&record.id, &mut MockUI::new())
            .unwrap_err();

        assert!(matches!(err, PromoteError::InvalidRunState { .. }));
    }

    #[test]
    fn specified_tests_reach_validate_command() {
        let fixture = Fixture::new(Recording::default());
        let mut params = RunParameters::new(Environment::Qa);
        params.test_level = TestLevel::RunSpecifiedTests;
        params.specified_tests = vec!["AccountTest".to_string(), "LeadTest".to_string()];

        fixture.run(params);

        assert!(fixture
            .commands
            .ran("validate RunSpecifiedTests --tests AccountTest --tests LeadTest"));
    }

    #[test]
    fn shell_syntax_in_version_tag_is_rejected_before_any_command() {
        let fixture = Fixture::new(Recording::default());
        let mut params = RunParameters::new(Environment::Production);
        params.version_tag = Some("v1.2.3;touch$IFS/tmp/sfpromote-injected".to_string());

        let err = fixture
            .runner()
            .run(params, &RunOptions::default(), &mut MockUI::new())
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(fixture.commands.calls().is_empty());
        assert!(fixture.runner().store().list().unwrap().is_empty());
    }

    #[test]
    fn paths_with_spaces_reach_commands_as_single_words() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("my project");
        std::fs::create_dir_all(&root).unwrap();
        write_coverage(&root, 90.0);

        let mut config = test_config();
        config.commands.lint = "lint ${reports_dir}".to_string();
        let mut commands = Recording::default();
        commands
            .stdout
            .push(("limits", r#"{"status":0,"result":[]}"#.to_string()));
        let approvals = FixedApproval::new(ApprovalOutcome::TimedOut);
        let tracker = RecordingTracker::default();
        let runner = PipelineRunner::new(&config, &root, &commands, &approvals, &tracker)
            .with_env(env());

        let record = runner
            .run(
                RunParameters::new(Environment::Qa),
                &RunOptions::default(),
                &mut MockUI::new(),
            )
            .unwrap();

        assert_eq!(record.status, RunStatus::Success);
        let calls = commands.calls();
        let login = calls.iter().find(|c| c.starts_with("login ")).unwrap();
        assert!(login.starts_with("login '"), "{login}");
        assert!(login.contains("/my project/"), "{login}");
        assert!(login.ends_with("' sfpromote-target"), "{login}");
        let lint = calls.iter().find(|c| c.starts_with("lint ")).unwrap();
        let expected = runner.store().artifacts_dir(&record.id).join("reports");
        assert_eq!(*lint, format!("lint '{}'", expected.display()));
    }

    #[test]
    fn resume_without_decision_stays_parked_without_logging_in() {
        let mut fixture = Fixture::new(Recording::default());
        fixture.approvals = FixedApproval::new(ApprovalOutcome::Detached);
        let (parked, _) = fixture.run(RunParameters::new(Environment::Production));
        assert_eq!(fixture.commands.count("login"), 1);

        *fixture.approvals.outcome.borrow_mut() = Some(ApprovalOutcome::Detached);
        let mut ui = MockUI::new();
        let record = fixture.runner().resume(&parked.id, &mut ui).unwrap();

        assert_eq!(record.status, RunStatus::AwaitingApproval);
        assert_eq!(record.stages.len(), parked.stages.len());
        assert_eq!(fixture.commands.count("login"), 1);
        assert_eq!(fixture.commands.count("logout"), 1);
        assert!(ui.has_warning("still waiting"));
        assert!(ui.summaries().is_empty());
    }

    #[test]
    fn resume_after_rejection_aborts_without_logging_in() {
        let mut fixture = Fixture::new(Recording::default());
        fixture.approvals = FixedApproval::new(ApprovalOutcome::Detached);
        let (parked, _) = fixture.run(RunParameters::new(Environment::Production));

        *fixture.approvals.outcome.borrow_mut() = Some(ApprovalOutcome::Rejected(
            ApprovalDecision::reject("Dana", Some("freeze".to_string())),
        ));
        let record = fixture.runner().resume(&parked.id, &mut MockUI::new()).unwrap();

        assert_eq!(record.status, RunStatus::Aborted);
        assert_eq!(status_of(&record, Stage::Approval), StageStatus::Aborted);
        assert_eq!(fixture.commands.count("login"), 1);
        assert!(!fixture.commands.ran("deploy"));
        assert_eq!(fixture.approvals.asked(), 2);
    }
}
