//! Reading tool reports and archiving them with the run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::shell::extract_json;

/// `result.summary` of the org test runner's JSON output.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgTestSummary {
    pub outcome: String,
    pub tests_ran: u64,
    pub failing: u64,
    pub org_wide_coverage: Option<String>,
}

impl OrgTestSummary {
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{}: {} tests, {} failing",
            self.outcome, self.tests_ran, self.failing
        );
        if let Some(coverage) = &self.org_wide_coverage {
            text.push_str(&format!(", org-wide coverage {}", coverage));
        }
        text
    }
}

/// Numbers in CLI JSON are sometimes strings.
fn as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Parse the test summary out of the org test runner's stdout.
pub fn parse_org_test_summary(output: &str) -> Option<OrgTestSummary> {
    let json: Value = serde_json::from_str(extract_json(output)?).ok()?;
    let summary = json.get("result")?.get("summary")?;

    Some(OrgTestSummary {
        outcome: as_text(summary.get("outcome")).unwrap_or_else(|| "Unknown".to_string()),
        tests_ran: as_u64(summary.get("testsRan")),
        failing: as_u64(summary.get("failing")),
        org_wide_coverage: as_text(summary.get("orgWideCoverage")),
    })
}

/// Id and status of a deploy or validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploySummary {
    pub id: Option<String>,
    pub status: Option<String>,
}

impl DeploySummary {
    pub fn describe(&self) -> Option<String> {
        match (&self.id, &self.status) {
            (Some(id), Some(status)) => Some(format!("deployment {} {}", id, status)),
            (Some(id), None) => Some(format!("deployment {}", id)),
            (None, Some(status)) => Some(format!("deployment {}", status)),
            (None, None) => None,
        }
    }
}

/// Parse `result.id` and `result.status` of a deploy CLI payload.
pub fn parse_deploy_summary(payload: &str) -> Option<DeploySummary> {
    let json: Value = serde_json::from_str(payload).ok()?;
    let result = json.get("result")?;
    Some(DeploySummary {
        id: as_text(result.get("id")),
        status: as_text(result.get("status")),
    })
}

/// Write `content` to `<artifacts_dir>/<name>` and return the relative path.
pub fn write_artifact(artifacts_dir: &Path, name: &str, content: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(artifacts_dir)?;
    fs::write(artifacts_dir.join(name), content)?;
    Ok(PathBuf::from(name))
}

/// Copy the directory `source` to `<artifacts_dir>/<name>`.
///
/// Returns `None` when `source` does not exist.
pub fn archive_dir(source: &Path, artifacts_dir: &Path, name: &str) -> io::Result<Option<PathBuf>> {
    if !source.is_dir() {
        return Ok(None);
    }
    copy_dir(source, &artifacts_dir.join(name))?;
    Ok(Some(PathBuf::from(name)))
}

fn copy_dir(source: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&path, &dest)?;
        } else {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}

/// Whether `dir` exists and has at least one entry.
pub fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APEX_OUTPUT: &str = r#"Warning: apex run test is in beta
{
  "status": 0,
  "result": {
    "summary": {
      "outcome": "Passed",
      "testsRan": 42,
      "failing": 0,
      "orgWideCoverage": "81%"
    },
    "tests": []
  }
}"#;

    #[test]
    fn parses_org_test_summary_after_warnings() {
        let summary = parse_org_test_summary(APEX_OUTPUT).unwrap();
        assert_eq!(summary.outcome, "Passed");
        assert_eq!(summary.tests_ran, 42);
        assert_eq!(summary.failing, 0);
        assert_eq!(
            summary.describe(),
            "Passed: 42 tests, 0 failing, org-wide coverage 81%"
        );
    }

    #[test]
    fn string_counts_are_accepted() {
        let summary = parse_org_test_summary(
            r#"{"result":{"summary":{"outcome":"Failed","testsRan":"7","failing":"2"}}}"#,
        )
        .unwrap();
        assert_eq!(summary.tests_ran, 7);
        assert_eq!(summary.failing, 2);
        assert_eq!(summary.org_wide_coverage, None);
    }

    #[test]
    fn no_summary_in_plain_output() {
        assert_eq!(parse_org_test_summary("Test run complete"), None);
        assert_eq!(parse_org_test_summary(r#"{"result":{}}"#), None);
    }

    #[test]
    fn parses_deploy_summary() {
        let summary = parse_deploy_summary(
            r#"{"status":0,"result":{"id":"0Af5g00000XyZ","status":"Succeeded","success":true}}"#,
        )
        .unwrap();
        assert_eq!(
            summary.describe().as_deref(),
            Some("deployment 0Af5g00000XyZ Succeeded")
        );
    }

    #[test]
    fn archives_directory_tree() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("coverage");
        std::fs::create_dir_all(source.join("lcov-report")).unwrap();
        std::fs::write(source.join("coverage-summary.json"), "{}").unwrap();
        std::fs::write(source.join("lcov-report/index.html"), "<html>").unwrap();
        let artifacts = temp.path().join("artifacts");

        let archived = archive_dir(&source, &artifacts, "coverage").unwrap();

        assert_eq!(archived, Some(PathBuf::from("coverage")));
        assert!(artifacts.join("coverage/lcov-report/index.html").exists());
    }

    #[test]
    fn archiving_missing_directory_is_noop() {
        let temp = TempDir::new().unwrap();
        let archived = archive_dir(&temp.path().join("nope"), temp.path(), "x").unwrap();
        assert_eq!(archived, None);
    }

    #[test]
    fn writes_artifact_file() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(temp.path(), "deploy-result.json", "{}").unwrap();
        assert_eq!(path, PathBuf::from("deploy-result.json"));
        assert!(has_entries(temp.path()));
    }
}
