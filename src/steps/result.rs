//! Stage outcomes.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Stage;

/// Outcome of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// All commands succeeded.
    Success,
    /// A tolerated command failed or a soft gate tripped.
    Unstable,
    /// A fatal command or gate failed.
    Failed,
    /// The stage's condition was false.
    Skipped,
    /// Approval was rejected or timed out.
    Aborted,
}

impl StageStatus {
    /// Whether the run may continue past this stage.
    pub fn allows_continue(&self) -> bool {
        matches!(self, Self::Success | Self::Unstable | Self::Skipped)
    }

    /// Get a display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            Self::Success => '✓',
            Self::Unstable => '!',
            Self::Failed => '✗',
            Self::Skipped => '⊘',
            Self::Aborted => '■',
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Unstable => "unstable",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Write-once record of a finished stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Masked command output captured during the stage.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    /// Archived files, relative to the run's artifact directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StageResult {
    /// Result for a stage whose condition was false.
    pub fn skipped(stage: Stage, reason: &str) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            started_at: Utc::now(),
            duration_ms: 0,
            output: String::new(),
            artifacts: Vec::new(),
            message: Some(reason.to_string()),
        }
    }

    /// Stage duration.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Accumulates the parts of a [`StageResult`] while a stage executes.
#[derive(Debug)]
pub struct StageRecorder {
    stage: Stage,
    started_at: DateTime<Utc>,
    status: StageStatus,
    output: String,
    artifacts: Vec<PathBuf>,
    notes: Vec<String>,
}

impl StageRecorder {
    /// Start recording a stage.
    pub fn start(stage: Stage) -> Self {
        Self {
            stage,
            started_at: Utc::now(),
            status: StageStatus::Success,
            output: String::new(),
            artifacts: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// The stage being recorded.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Current status.
    pub fn status(&self) -> StageStatus {
        self.status
    }

    /// Append captured (already masked) output.
    pub fn append_output(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.output.push_str(text);
        if !text.ends_with('\n') {
            self.output.push('\n');
        }
    }

    /// Record an archived artifact path.
    pub fn artifact(&mut self, path: PathBuf) {
        self.artifacts.push(path);
    }

    /// Add a note to the stage message.
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Downgrade to unstable unless already worse.
    pub fn mark_unstable(&mut self, note: impl Into<String>) {
        if self.status == StageStatus::Success {
            self.status = StageStatus::Unstable;
        }
        self.note(note);
    }

    /// Mark the stage failed.
    pub fn mark_failed(&mut self, note: impl Into<String>) {
        self.status = StageStatus::Failed;
        self.note(note);
    }

    /// Mark the stage aborted.
    pub fn mark_aborted(&mut self, note: impl Into<String>) {
        self.status = StageStatus::Aborted;
        self.note(note);
    }

    /// Seal the record.
    pub fn finish(self) -> StageResult {
        let elapsed = Utc::now() - self.started_at;
        StageResult {
            stage: self.stage,
            status: self.status,
            started_at: self.started_at,
            duration_ms: elapsed.num_milliseconds().max(0) as u64,
            output: self.output,
            artifacts: self.artifacts,
            message: if self.notes.is_empty() {
                None
            } else {
                Some(self.notes.join("; "))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_result_carries_reason() {
        let result = StageResult::skipped(Stage::UnitTests, "tests disabled");
        assert_eq!(result.status, StageStatus::Skipped);
        assert_eq!(result.message.as_deref(), Some("tests disabled"));
        assert_eq!(result.duration_ms, 0);
    }

    #[test]
    fn unstable_does_not_mask_failure() {
        let mut recorder = StageRecorder::start(Stage::Deploy);
        recorder.mark_failed("deploy failed");
        recorder.mark_unstable("backup failed");
        let result = recorder.finish();
        assert_eq!(result.status, StageStatus::Failed);
        assert_eq!(
            result.message.as_deref(),
            Some("deploy failed; backup failed")
        );
    }

    #[test]
    fn recorder_terminates_output_lines() {
        let mut recorder = StageRecorder::start(Stage::Initialize);
        recorder.append_output("sf 2.40.7");
        recorder.append_output("");
        recorder.append_output("node v20\n");
        assert_eq!(recorder.finish().output, "sf 2.40.7\nnode v20\n");
    }

    #[test]
    fn continue_policy() {
        assert!(StageStatus::Success.allows_continue());
        assert!(StageStatus::Unstable.allows_continue());
        assert!(StageStatus::Skipped.allows_continue());
        assert!(!StageStatus::Failed.allows_continue());
        assert!(!StageStatus::Aborted.allows_continue());
    }

    #[test]
    fn stage_result_serializes_status_lowercase() {
        let result = StageRecorder::start(Stage::Deploy).finish();
        let yaml = serde_yaml::to_string(&result).unwrap();
        assert!(yaml.contains("status: success"));
        assert!(yaml.contains("stage: deploy"));
    }
}
