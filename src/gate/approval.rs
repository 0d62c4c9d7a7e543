//! Manual approval before promoting to UAT and PRODUCTION.
//!
//! The request is persisted in the run record so the wait survives process
//! restarts. A decision arrives either from an interactive prompt
//! ([`PromptApproval`]) or from `sfpromote approve|reject`, which writes it
//! into the record that [`StoreApproval`] polls. The prompt polls the record
//! too, so whichever decision lands first wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use console::Term;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::environment::{ApproverRole, Environment};
use crate::error::{PromoteError, Result};
use crate::state::{RunId, RunStatus, RunStore};
use crate::ui::{prompt_user, Prompt, PromptOption, PromptResult, PromptType, UserInterface};

/// A pending request for a human to authorize a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub run_id: RunId,
    pub environment: Environment,
    pub required_role: ApproverRole,
    pub requested_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Build a request, or `None` when `environment` needs no approval.
    pub fn new(run_id: RunId, environment: Environment, timeout: chrono::Duration) -> Option<Self> {
        let required_role = environment.approver_role()?;
        let requested_at = Utc::now();
        Some(Self {
            run_id,
            environment,
            required_role,
            requested_at,
            deadline: requested_at + timeout,
        })
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }

    /// Time left until the deadline, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Approve or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A recorded human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub verdict: Verdict,
    pub approver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ApproverRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ApprovalDecision {
    pub fn approve(approver: &str, role: ApproverRole, comment: Option<String>) -> Self {
        Self {
            verdict: Verdict::Approved,
            approver: approver.trim().to_string(),
            role: Some(role),
            comment: comment.filter(|c| !c.trim().is_empty()),
            decided_at: Utc::now(),
        }
    }

    pub fn reject(approver: &str, reason: Option<String>) -> Self {
        Self {
            verdict: Verdict::Rejected,
            approver: approver.trim().to_string(),
            role: None,
            comment: reason.filter(|c| !c.trim().is_empty()),
            decided_at: Utc::now(),
        }
    }

    /// One-line description for stage messages and history.
    pub fn describe(&self) -> String {
        let mut text = format!("{} by {}", self.verdict, self.approver);
        if let Some(role) = self.role {
            text.push_str(&format!(" ({})", role));
        }
        if let Some(comment) = &self.comment {
            text.push_str(&format!(": {}", comment));
        }
        text
    }
}

/// How a wait at the gate ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome {
    Approved(ApprovalDecision),
    Rejected(ApprovalDecision),
    TimedOut,
    /// The request was persisted and the process should exit.
    Detached,
}

impl ApprovalOutcome {
    fn from_decision(decision: ApprovalDecision) -> Self {
        match decision.verdict {
            Verdict::Approved => Self::Approved(decision),
            Verdict::Rejected => Self::Rejected(decision),
        }
    }
}

/// Check that `decision` may be recorded against `request`.
///
/// Approvals need a role satisfying the environment's requirement. Both
/// approvals and rejections need an approver name, which must be on
/// `allow_list` when the list is non-empty.
pub fn authorize(
    request: &ApprovalRequest,
    decision: &ApprovalDecision,
    allow_list: &[String],
) -> Result<()> {
    let refuse = |message: String| PromoteError::ApprovalNotPermitted {
        approver: decision.approver.clone(),
        environment: request.environment.to_string(),
        message,
    };

    if decision.approver.is_empty() {
        return Err(refuse("an approver name is required".to_string()));
    }

    if !allow_list.is_empty()
        && !allow_list
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&decision.approver))
    {
        return Err(refuse(format!(
            "not listed in approval.approvers.{}",
            request.environment.config_key()
        )));
    }

    if decision.verdict == Verdict::Approved {
        match decision.role {
            Some(role) if role.satisfies(request.required_role) => {}
            Some(role) => {
                return Err(refuse(format!(
                    "role {} cannot approve, {} required",
                    role, request.required_role
                )))
            }
            None => {
                return Err(refuse(format!(
                    "approving requires the {} role",
                    request.required_role
                )))
            }
        }
    }

    Ok(())
}

/// Where approval decisions come from.
pub trait ApprovalSource {
    /// Wait for a decision on `request`.
    fn await_decision(
        &self,
        request: &ApprovalRequest,
        ui: &mut dyn UserInterface,
    ) -> Result<ApprovalOutcome>;
}

/// Answers one prompt; runs on a worker thread while the store is polled.
pub type PromptFn = dyn Fn(&Prompt) -> Result<PromptResult> + Send + Sync;

/// Asks the person at the terminal.
///
/// The prompt runs on its own thread while the run record keeps being
/// polled, so the deadline and decisions made with `sfpromote approve|reject`
/// still end the wait when nobody answers.
pub struct PromptApproval {
    allow_list: Vec<String>,
    store: StoreApproval,
    prompt: Arc<PromptFn>,
}

impl PromptApproval {
    pub fn new(allow_list: Vec<String>, store: StoreApproval) -> Self {
        Self {
            allow_list,
            store,
            prompt: Arc::new(|prompt: &Prompt| prompt_user(prompt, &Term::stdout())),
        }
    }

    /// Answer prompts with `prompt` instead of the terminal.
    pub fn with_prompt<F>(mut self, prompt: F) -> Self
    where
        F: Fn(&Prompt) -> Result<PromptResult> + Send + Sync + 'static,
    {
        self.prompt = Arc::new(prompt);
        self
    }

    fn spawn_ask(&self, request: &ApprovalRequest, answers: &Sender<Result<ApprovalDecision>>) {
        let prompt = Arc::clone(&self.prompt);
        let request = request.clone();
        let answers = answers.clone();
        std::thread::spawn(move || {
            // The receiver is gone once the wait ended some other way.
            let _ = answers.send(ask(prompt.as_ref(), &request));
        });
    }

    /// Store the prompted decision unless one was recorded first.
    fn settle(
        &self,
        request: &ApprovalRequest,
        decision: ApprovalDecision,
        ui: &mut dyn UserInterface,
    ) -> Result<ApprovalOutcome> {
        if let Some(outcome) = self.store.poll(request)? {
            if outcome != ApprovalOutcome::TimedOut {
                ui.warning("A decision was already recorded for this run; the prompt answer is ignored");
            }
            return Ok(outcome);
        }
        match self.store.store.record_decision(&request.run_id, decision.clone()) {
            Ok(_) => Ok(ApprovalOutcome::from_decision(decision)),
            Err(e) => match self.store.poll(request)? {
                Some(outcome) => Ok(outcome),
                None => Err(e),
            },
        }
    }
}

fn ask(prompt: &PromptFn, request: &ApprovalRequest) -> Result<ApprovalDecision> {
    let approve = prompt(&Prompt {
        key: "approve".to_string(),
        question: format!(
            "Approve deployment of {} to {}?",
            request.run_id, request.environment
        ),
        prompt_type: PromptType::Confirm,
        default: Some("false".to_string()),
    })?
    .as_bool()
    .unwrap_or(false);

    let approver = prompt(&Prompt {
        key: "approver".to_string(),
        question: "Your name".to_string(),
        prompt_type: PromptType::Input,
        default: None,
    })?
    .as_string();

    if !approve {
        let reason = prompt(&Prompt {
            key: "rejection_reason".to_string(),
            question: "Reason for rejecting".to_string(),
            prompt_type: PromptType::Input,
            default: Some(String::new()),
        })?
        .as_string();
        return Ok(ApprovalDecision::reject(&approver, Some(reason)));
    }

    let role = prompt(&Prompt {
        key: "approver_role".to_string(),
        question: "Your role".to_string(),
        prompt_type: PromptType::Select {
            options: [ApproverRole::TechLead, ApproverRole::ReleaseManager]
                .iter()
                .map(|role| PromptOption {
                    label: role.to_string(),
                    value: role.name().to_string(),
                })
                .collect(),
        },
        default: Some(request.required_role.name().to_string()),
    })?
    .as_string();
    let role = role
        .parse::<ApproverRole>()
        .map_err(|message| PromoteError::ConfigValidationError { message })?;

    Ok(ApprovalDecision::approve(&approver, role, None))
}

impl ApprovalSource for PromptApproval {
    fn await_decision(
        &self,
        request: &ApprovalRequest,
        ui: &mut dyn UserInterface,
    ) -> Result<ApprovalOutcome> {
        if let Some(outcome) = self.store.poll(request)? {
            return Ok(outcome);
        }

        let (answers, answered) = mpsc::channel();
        self.spawn_ask(request, &answers);

        loop {
            let wait = self.store.poll_interval.min(request.remaining(Utc::now()));
            match answered.recv_timeout(wait.max(Duration::from_millis(1))) {
                Ok(Ok(_)) if request.is_expired(Utc::now()) => {
                    ui.warning("Approval timed out before the answer arrived");
                    return Ok(ApprovalOutcome::TimedOut);
                }
                Ok(Ok(decision)) => match authorize(request, &decision, &self.allow_list) {
                    Ok(()) => return self.settle(request, decision, ui),
                    Err(e @ PromoteError::ApprovalNotPermitted { .. }) => {
                        ui.error(&e.to_string());
                        self.spawn_ask(request, &answers);
                    }
                    Err(e) => return Err(e),
                },
                Ok(Err(e)) => {
                    tracing::warn!(run_id = %request.run_id, "approval prompt failed: {}", e);
                    ui.warning(&format!(
                        "Cannot prompt for approval ({}); waiting for sfpromote approve {}",
                        e, request.run_id
                    ));
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }

            if let Some(outcome) = self.store.poll(request)? {
                match &outcome {
                    ApprovalOutcome::Approved(d) | ApprovalOutcome::Rejected(d) => {
                        ui.message(&format!("Decision recorded outside the prompt: {}", d.describe()))
                    }
                    _ => ui.warning("Approval timed out"),
                }
                return Ok(outcome);
            }
        }
    }
}

/// Waits for a decision written into the run record.
pub struct StoreApproval {
    store: RunStore,
    poll_interval: Duration,
    detach: bool,
}

impl StoreApproval {
    pub fn new(store: RunStore, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
            detach: false,
        }
    }

    /// Return [`ApprovalOutcome::Detached`] instead of waiting.
    pub fn detached(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    /// Check the record once.
    pub fn poll(&self, request: &ApprovalRequest) -> Result<Option<ApprovalOutcome>> {
        let record = self.store.load(&request.run_id)?;

        if let Some(decision) = record.approval.and_then(|a| a.decision) {
            return Ok(Some(ApprovalOutcome::from_decision(decision)));
        }

        if record.status != RunStatus::AwaitingApproval {
            return Err(PromoteError::InvalidRunState {
                run_id: request.run_id.to_string(),
                status: record.status.to_string(),
                message: "run is no longer waiting for approval".to_string(),
            });
        }

        if request.is_expired(Utc::now()) {
            return Ok(Some(ApprovalOutcome::TimedOut));
        }

        Ok(None)
    }
}

impl ApprovalSource for StoreApproval {
    fn await_decision(
        &self,
        request: &ApprovalRequest,
        ui: &mut dyn UserInterface,
    ) -> Result<ApprovalOutcome> {
        if let Some(outcome) = self.poll(request)? {
            return Ok(outcome);
        }

        if self.detach {
            return Ok(ApprovalOutcome::Detached);
        }

        let mut spinner = ui.start_spinner(&format!(
            "Waiting for {} approval (sfpromote approve {})",
            request.required_role, request.run_id
        ));

        loop {
            let wait = self.poll_interval.min(request.remaining(Utc::now()));
            std::thread::sleep(wait.max(Duration::from_millis(1)));

            match self.poll(request) {
                Ok(Some(outcome)) => {
                    match &outcome {
                        ApprovalOutcome::Approved(d) => spinner.finish_success(&d.describe()),
                        ApprovalOutcome::Rejected(d) => spinner.finish_error(&d.describe()),
                        _ => spinner.finish_error("Approval timed out"),
                    }
                    return Ok(outcome);
                }
                Ok(None) => {
                    tracing::debug!(run_id = %request.run_id, "no approval decision yet");
                }
                Err(e) => {
                    spinner.finish_error("Approval wait failed");
                    return Err(e);
                }
            }
        }
    }
}
