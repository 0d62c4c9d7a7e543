//! Run records.
//!
//! A [`RunRecord`] is the persisted state of one pipeline run. Stage results
//! are only ever appended; the approval request and decision are the only
//! pieces written from outside the running process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::RunId;
use crate::environment::RunParameters;
use crate::gate::{ApprovalDecision, ApprovalRequest};
use crate::steps::{Stage, StageResult, StageStatus};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    AwaitingApproval,
    Success,
    Unstable,
    Failure,
    Aborted,
}

impl RunStatus {
    /// Process exit code for a run ending in this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success | Self::Unstable => 0,
            Self::Running | Self::Failure => 1,
            Self::Aborted => 3,
            Self::AwaitingApproval => 4,
        }
    }

    /// Whether the run has ended for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Unstable | Self::Failure | Self::Aborted
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::AwaitingApproval => "AWAITING_APPROVAL",
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Approval request plus the decision, once made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalState {
    pub request: ApprovalRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ApprovalDecision>,
}

/// Stage counts for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub run: usize,
    pub skipped: usize,
    pub unstable: usize,
    pub failed: usize,
}

/// A record of a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,

    /// Human-readable run description, e.g. `PRODUCTION deploy · with tests`.
    pub description: String,

    pub parameters: RunParameters,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Finished stages in execution order.
    #[serde(default)]
    pub stages: Vec<StageResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalState>,

    /// Ticket id found in the latest commit message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,

    /// Link to the full log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,

    /// Run-level error, if the run failed outside a stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    /// A new running record.
    pub fn new(id: RunId, parameters: RunParameters) -> Self {
        Self {
            id,
            description: parameters.describe(),
            parameters,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            approval: None,
            ticket: None,
            log_url: None,
            error: None,
        }
    }

    /// Append a finished stage.
    pub fn push_stage(&mut self, result: StageResult) {
        self.stages.push(result);
    }

    /// Result recorded for `stage`, if it has finished.
    pub fn stage_result(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    /// First stage that failed or aborted.
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stages
            .iter()
            .find(|r| matches!(r.status, StageStatus::Failed | StageStatus::Aborted))
    }

    pub fn counts(&self) -> StageCounts {
        let mut counts = StageCounts::default();
        for result in &self.stages {
            match result.status {
                StageStatus::Skipped => counts.skipped += 1,
                StageStatus::Success => counts.run += 1,
                StageStatus::Unstable => {
                    counts.run += 1;
                    counts.unstable += 1;
                }
                StageStatus::Failed | StageStatus::Aborted => {
                    counts.run += 1;
                    counts.failed += 1;
                }
            }
        }
        counts
    }

    /// Persist an approval request and wait on it.
    pub fn await_approval(&mut self, request: ApprovalRequest) {
        self.approval = Some(ApprovalState {
            request,
            decision: None,
        });
        self.status = RunStatus::AwaitingApproval;
    }

    /// Terminal status implied by the recorded stages.
    pub fn stage_outcome(&self) -> RunStatus {
        let mut status = RunStatus::Success;
        for result in &self.stages {
            match result.status {
                StageStatus::Failed => return RunStatus::Failure,
                StageStatus::Aborted => return RunStatus::Aborted,
                StageStatus::Unstable => status = RunStatus::Unstable,
                StageStatus::Success | StageStatus::Skipped => {}
            }
        }
        status
    }

    /// Mark the run finished.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time from start to finish (or now).
    pub fn duration(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }
}
