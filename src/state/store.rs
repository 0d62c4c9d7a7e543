//! Persistent run storage.
//!
//! Layout under the work directory:
//!
//! ```text
//! .sfpromote/
//! ├── run.lock
//! └── runs/
//!     └── run_1718000000000_3f2a9c1d/
//!         ├── run.yml
//!         ├── console.log
//!         └── artifacts/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::{RunId, RunRecord, RunStatus};
use crate::environment::RunParameters;
use crate::error::{PromoteError, Result};
use crate::gate::ApprovalDecision;

/// Reads and writes run records under a work directory.
#[derive(Debug, Clone)]
pub struct RunStore {
    work_dir: PathBuf,
}

impl RunStore {
    /// Default number of runs to keep.
    pub const DEFAULT_HISTORY_RETENTION: usize = 50;

    /// Store rooted at `work_dir` (usually `<project>/.sfpromote`).
    pub fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.work_dir.join("runs")
    }

    pub fn run_dir(&self, id: &RunId) -> PathBuf {
        self.runs_dir().join(id.as_str())
    }

    pub fn record_path(&self, id: &RunId) -> PathBuf {
        self.run_dir(id).join("run.yml")
    }

    pub fn console_log_path(&self, id: &RunId) -> PathBuf {
        self.run_dir(id).join("console.log")
    }

    pub fn artifacts_dir(&self, id: &RunId) -> PathBuf {
        self.run_dir(id).join("artifacts")
    }

    /// Create and persist a new running record.
    pub fn create(&self, parameters: RunParameters) -> Result<RunRecord> {
        let id = RunId::generate(parameters.environment);
        fs::create_dir_all(self.artifacts_dir(&id))?;

        let record = RunRecord::new(id, parameters);
        self.save(&record)?;
        Ok(record)
    }

    /// Save a record using atomic write.
    ///
    /// Uses the write-to-temp-then-rename pattern so a reader polling for
    /// an approval decision never sees a partially written file.
    pub fn save(&self, record: &RunRecord) -> Result<()> {
        let dir = self.run_dir(&record.id);
        fs::create_dir_all(&dir)?;

        let path = self.record_path(&record.id);
        let content =
            serde_yaml::to_string(record).map_err(|e| PromoteError::ConfigValidationError {
                message: format!("Failed to serialize run record: {}", e),
            })?;

        let temp_path = path.with_extension("yml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    /// Load a record by id.
    pub fn load(&self, id: &RunId) -> Result<RunRecord> {
        let path = self.record_path(id);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PromoteError::RunNotFound {
                    run_id: id.to_string(),
                }
            } else {
                PromoteError::Io(e)
            }
        })?;

        serde_yaml::from_str(&content).map_err(|e| PromoteError::ConfigParseError {
            path,
            message: e.to_string(),
        })
    }

    /// All readable records, newest first.
    pub fn list(&self) -> Result<Vec<RunRecord>> {
        let dir = self.runs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<RunId>().ok())
            else {
                continue;
            };

            match self.load(&id) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(run_id = %id, "skipping unreadable run record: {}", e),
            }
        }

        records.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    /// Most recent record, if any.
    pub fn latest(&self) -> Result<Option<RunRecord>> {
        Ok(self.list()?.into_iter().next())
    }

    /// Write a human decision into a run that is waiting for one.
    ///
    /// Permission checks are the caller's job (see [`crate::gate::authorize`]).
    pub fn record_decision(&self, id: &RunId, decision: ApprovalDecision) -> Result<RunRecord> {
        let mut record = self.load(id)?;

        let invalid = |record: &RunRecord, message: &str| PromoteError::InvalidRunState {
            run_id: id.to_string(),
            status: record.status.to_string(),
            message: message.to_string(),
        };

        if record.status != RunStatus::AwaitingApproval {
            return Err(invalid(&record, "run is not waiting for approval"));
        }

        let Some(approval) = record.approval.as_mut() else {
            return Err(invalid(&record, "run has no approval request"));
        };

        if approval.decision.is_some() {
            return Err(invalid(&record, "a decision has already been recorded"));
        }

        approval.decision = Some(decision);
        self.save(&record)?;
        Ok(record)
    }

    /// Remove the oldest finished runs beyond `keep`.
    ///
    /// Runs that are still running or waiting for approval are never removed.
    /// Returns the number of runs removed.
    pub fn prune(&self, keep: usize) -> Result<usize> {
        let records = self.list()?;
        let mut removed = 0;

        for record in records.iter().skip(keep) {
            if !record.status.is_terminal() {
                continue;
            }
            fs::remove_dir_all(self.run_dir(&record.id))?;
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(removed, keep, "pruned run history");
        }
        Ok(removed)
    }
}
