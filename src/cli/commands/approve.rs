//! Approve and reject command implementations.
//!
//! Both write a decision into a run waiting at the approval gate. A run that
//! is still polling picks it up; a parked run needs `sfpromote resume`.

use chrono::Utc;

use crate::cli::args::{ApproveArgs, RejectArgs};
use crate::environment::ApproverRole;
use crate::error::{PromoteError, Result};
use crate::gate::{authorize, ApprovalDecision};
use crate::state::{RunId, RunLock, RunRecord};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectContext};

/// The approve command implementation.
pub struct ApproveCommand {
    project: ProjectContext,
    args: ApproveArgs,
}

impl ApproveCommand {
    pub fn new(project: ProjectContext, args: ApproveArgs) -> Self {
        Self { project, args }
    }
}

impl Command for ApproveCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let role: ApproverRole = self
            .args
            .role
            .parse()
            .map_err(|message| PromoteError::ConfigValidationError { message })?;
        let decision =
            ApprovalDecision::approve(&self.args.approver, role, self.args.comment.clone());

        record_decision(&self.project, &self.args.run_id, decision, ui)
    }
}

/// The reject command implementation.
pub struct RejectCommand {
    project: ProjectContext,
    args: RejectArgs,
}

impl RejectCommand {
    pub fn new(project: ProjectContext, args: RejectArgs) -> Self {
        Self { project, args }
    }
}

impl Command for RejectCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let decision = ApprovalDecision::reject(&self.args.approver, self.args.reason.clone());
        record_decision(&self.project, &self.args.run_id, decision, ui)
    }
}

fn record_decision(
    project: &ProjectContext,
    run_id: &str,
    decision: ApprovalDecision,
    ui: &mut dyn UserInterface,
) -> Result<CommandResult> {
    let run_id: RunId = run_id.parse()?;
    let config = project.load_config()?;
    let store = project.store(&config);
    let record = store.load(&run_id)?;

    let request = match &record.approval {
        Some(approval) => approval.request.clone(),
        None => return Err(not_waiting(&record, "run has no approval request")),
    };
    if request.is_expired(Utc::now()) {
        return Err(not_waiting(&record, "the approval request has expired"));
    }

    let allow_list = config.approval.approvers.for_environment(request.environment);
    authorize(&request, &decision, allow_list)?;

    let record = store.record_decision(&run_id, decision.clone())?;
    tracing::info!(
        run_id = %record.id,
        verdict = %decision.verdict,
        approver = %decision.approver,
        "approval decision recorded"
    );
    ui.success(&format!("{}: {}", record.id, decision.describe()));

    // A run still holding the lock is polling and continues on its own.
    if !RunLock::path_for(store.work_dir()).exists() {
        ui.message(&format!("Continue the run with: sfpromote resume {}", record.id));
    }

    Ok(CommandResult::success())
}

fn not_waiting(record: &RunRecord, message: &str) -> PromoteError {
    PromoteError::InvalidRunState {
        run_id: record.id.to_string(),
        status: record.status.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Environment, RunParameters};
    use crate::gate::{ApprovalRequest, Verdict};
    use crate::state::{RunStatus, RunStore};
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    fn project(temp: &TempDir, approvers: &str) -> ProjectContext {
        let dir = temp.path().join(".sfpromote");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.yml"), approvers).unwrap();
        ProjectContext::new(temp.path(), None)
    }

    fn parked_run(temp: &TempDir, environment: Environment, minutes: i64) -> RunRecord {
        let store = RunStore::new(&temp.path().join(".sfpromote"));
        let mut record = store.create(RunParameters::new(environment)).unwrap();
        let request =
            ApprovalRequest::new(record.id.clone(), environment, chrono::Duration::minutes(minutes))
                .unwrap();
        record.await_approval(request);
        store.save(&record).unwrap();
        record
    }

    fn approve_args(run: &RunRecord, approver: &str, role: &str) -> ApproveArgs {
        ApproveArgs {
            run_id: run.id.to_string(),
            approver: approver.to_string(),
            role: role.to_string(),
            comment: Some("ship it".to_string()),
        }
    }

    #[test]
    fn release_manager_approves_production() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "approval:\n  approvers:\n    production: [Dana]\n");
        let run = parked_run(&temp, Environment::Production, 60);
        let mut ui = MockUI::new();

        let result = ApproveCommand::new(project.clone(), approve_args(&run, "dana", "release-manager"))
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_message("sfpromote resume"));
        let stored = RunStore::new(&temp.path().join(".sfpromote")).load(&run.id).unwrap();
        let decision = stored.approval.unwrap().decision.unwrap();
        assert_eq!(decision.verdict, Verdict::Approved);
        assert_eq!(decision.comment.as_deref(), Some("ship it"));
        assert_eq!(stored.status, RunStatus::AwaitingApproval);
    }

    #[test]
    fn tech_lead_cannot_approve_production() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "{}\n");
        let run = parked_run(&temp, Environment::Production, 60);

        let err = ApproveCommand::new(project, approve_args(&run, "Sam", "tech-lead"))
            .execute(&mut MockUI::new())
            .unwrap_err();

        assert!(matches!(err, PromoteError::ApprovalNotPermitted { .. }));
    }

    #[test]
    fn approver_must_be_listed() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "approval:\n  approvers:\n    uat: [Lee]\n");
        let run = parked_run(&temp, Environment::Uat, 60);

        let err = RejectCommand::new(
            project,
            RejectArgs {
                run_id: run.id.to_string(),
                approver: "Mallory".to_string(),
                reason: None,
            },
        )
        .execute(&mut MockUI::new())
        .unwrap_err();

        assert!(matches!(err, PromoteError::ApprovalNotPermitted { .. }));
    }

    #[test]
    fn reject_records_reason() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "{}\n");
        let run = parked_run(&temp, Environment::Uat, 60);

        RejectCommand::new(
            project,
            RejectArgs {
                run_id: run.id.to_string(),
                approver: "Lee".to_string(),
                reason: Some("missing release notes".to_string()),
            },
        )
        .execute(&mut MockUI::new())
        .unwrap();

        let stored = RunStore::new(&temp.path().join(".sfpromote")).load(&run.id).unwrap();
        let decision = stored.approval.unwrap().decision.unwrap();
        assert_eq!(decision.verdict, Verdict::Rejected);
        assert_eq!(decision.comment.as_deref(), Some("missing release notes"));
    }

    #[test]
    fn expired_request_is_refused() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "{}\n");
        let run = parked_run(&temp, Environment::Uat, -1);

        let err = ApproveCommand::new(project, approve_args(&run, "Lee", "tech-lead"))
            .execute(&mut MockUI::new())
            .unwrap_err();

        assert!(matches!(err, PromoteError::InvalidRunState { .. }));
    }

    #[test]
    fn unknown_role_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "{}\n");
        let run = parked_run(&temp, Environment::Uat, 60);

        let err = ApproveCommand::new(project, approve_args(&run, "Lee", "intern"))
            .execute(&mut MockUI::new())
            .unwrap_err();

        assert!(err.is_configuration());
    }

    #[test]
    fn finished_run_takes_no_decision() {
        let temp = TempDir::new().unwrap();
        let project = project(&temp, "{}\n");
        let store = RunStore::new(&temp.path().join(".sfpromote"));
        let mut run = store.create(RunParameters::new(Environment::Qa)).unwrap();
        run.finish(RunStatus::Success);
        store.save(&run).unwrap();

        let err = ApproveCommand::new(project, approve_args(&run, "Lee", "tech-lead"))
            .execute(&mut MockUI::new())
            .unwrap_err();

        assert!(matches!(err, PromoteError::InvalidRunState { .. }));
    }
}
