//! Configuration schema definitions for sfpromote.
//!
//! This module contains all the struct definitions that map to
//! `.sfpromote/config.yml`. Every field has a default, so an empty file
//! (or no file at all) describes a standard Salesforce DX project.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::environment::Environment;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PromoteConfig {
    /// Project name (for display purposes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,

    /// Global settings
    pub settings: Settings,

    /// Target org authentication
    pub org: OrgConfig,

    /// Unit test coverage gate
    pub coverage: CoverageConfig,

    /// External command templates
    pub commands: Commands,

    /// Tracking ticket updates
    pub tracker: TrackerConfig,

    /// Approval gate
    pub approval: ApprovalConfig,
}

/// Global settings that apply to every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    /// State directory, relative to the project root
    pub work_dir: PathBuf,

    /// Per-command time budget in minutes (0 disables)
    pub command_timeout_minutes: u64,

    /// How long the approval gate waits, in minutes
    pub approval_timeout_minutes: u64,

    /// How often a waiting gate re-reads the run record, in seconds
    pub approval_poll_seconds: u64,

    /// Mark the run UNSTABLE when a tolerated command fails
    pub mark_unstable_on_tolerated_failure: bool,

    /// Number of run records to keep
    pub history_retention: usize,

    /// Directories removed during cleanup, relative to the project root
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ephemeral_dirs: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(".sfpromote"),
            command_timeout_minutes: 60,
            approval_timeout_minutes: 24 * 60,
            approval_poll_seconds: 15,
            mark_unstable_on_tolerated_failure: true,
            history_retention: 50,
            ephemeral_dirs: vec![PathBuf::from(".sfdx/tmp"), PathBuf::from("mdapi_output")],
        }
    }
}

impl Settings {
    /// Command timeout in seconds, if enabled.
    pub fn command_timeout_secs(&self) -> Option<u64> {
        (self.command_timeout_minutes > 0).then_some(self.command_timeout_minutes * 60)
    }
}

/// Target org authentication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OrgConfig {
    /// CLI alias the session is stored under
    pub alias: String,

    /// Credential ids per environment. Each id names the environment
    /// variable through which the CI secret store injects an SFDX auth URL.
    pub credentials: Credentials,

    /// Optional dev-hub credential id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devhub_credential: Option<String>,
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            alias: "sfpromote-target".to_string(),
            credentials: Credentials::default(),
            devhub_credential: None,
        }
    }
}

/// Credential ids per environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Credentials {
    pub dev: String,
    pub qa: String,
    pub uat: String,
    pub production: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            dev: "SFDX_AUTH_URL_DEV".to_string(),
            qa: "SFDX_AUTH_URL_QA".to_string(),
            uat: "SFDX_AUTH_URL_UAT".to_string(),
            production: "SFDX_AUTH_URL_PROD".to_string(),
        }
    }
}

/// Coverage summary metric to gate on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CoverageMetric {
    #[default]
    Lines,
    Statements,
    Branches,
    Functions,
}

impl CoverageMetric {
    /// Key in the `json-summary` report.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Lines => "lines",
            Self::Statements => "statements",
            Self::Branches => "branches",
            Self::Functions => "functions",
        }
    }
}

/// Unit test coverage gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CoverageConfig {
    /// Istanbul `json-summary` report written by the unit test run
    pub summary_path: PathBuf,

    /// Coverage report directory archived after the run
    pub report_dir: PathBuf,

    /// Minimum percentage
    pub minimum: f64,

    /// Metric compared against the minimum
    pub metric: CoverageMetric,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            summary_path: PathBuf::from("coverage/coverage-summary.json"),
            report_dir: PathBuf::from("coverage"),
            minimum: 75.0,
            metric: CoverageMetric::Lines,
        }
    }
}

/// External command templates.
///
/// Templates may reference run variables with `${name}`: `org_alias`,
/// `devhub_alias`, `auth_file`, `environment`, `test_level`, `tests_arg`, `version_tag`,
/// `run_id`, `run_dir`, `artifacts_dir`, `reports_dir`, `test_results_dir`,
/// `backup_dir`, `project_root`. Values are shell-quoted on substitution;
/// `tests_arg` is the one pre-built fragment inserted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Commands {
    /// Source checkout (none when the CI host already checked out)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<String>,
    /// Tool version probes, printed during Initialize
    pub versions: Vec<String>,
    pub install: String,
    pub format_check: String,
    pub lint: String,
    pub static_analysis: String,
    pub vulnerability_scan: String,
    pub license_check: String,
    pub unit_tests: String,
    pub login: String,
    /// Dev-hub login, run only when `org.devhub_credential` is set
    pub devhub_login: String,
    pub validate: String,
    pub org_tests: String,
    pub backup: String,
    pub deploy: String,
    pub limits: String,
    pub last_commit_message: String,
    pub tag: String,
    pub push_tag: String,
    pub logout: String,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            checkout: None,
            versions: vec![
                "sf --version".to_string(),
                "node --version".to_string(),
                "npm --version".to_string(),
            ],
            install: "npm ci".to_string(),
            format_check: "npx prettier --check \"force-app/**/*.{cls,cmp,component,css,html,js,json,page,trigger,xml}\"".to_string(),
            lint: "npx eslint \"force-app/**/{aura,lwc}/**/*.js\" --format json --output-file ${reports_dir}/eslint.json".to_string(),
            static_analysis: "sf scanner run --target force-app --engine pmd --format json --outfile ${reports_dir}/pmd.json".to_string(),
            vulnerability_scan: "npm audit --audit-level=high --json > ${reports_dir}/npm-audit.json".to_string(),
            license_check: "npx license-checker --production --csv --out ${reports_dir}/licenses.csv".to_string(),
            unit_tests: "npm run test:unit:coverage".to_string(),
            login: "sf org login sfdx-url --sfdx-url-file ${auth_file} --alias ${org_alias} --set-default".to_string(),
            devhub_login: "sf org login sfdx-url --sfdx-url-file ${auth_file} --alias ${devhub_alias} --set-default-dev-hub".to_string(),
            validate: "sf project deploy validate --source-dir force-app --target-org ${org_alias} --test-level ${test_level}${tests_arg} --wait 120 --json".to_string(),
            org_tests: "sf apex run test --target-org ${org_alias} --test-level RunLocalTests --code-coverage --result-format json --output-dir ${test_results_dir} --wait 120".to_string(),
            backup: "sf project retrieve start --manifest manifest/package.xml --target-org ${org_alias} --output-dir ${backup_dir}".to_string(),
            deploy: "sf project deploy start --source-dir force-app --target-org ${org_alias} --test-level ${test_level}${tests_arg} --wait 120 --json".to_string(),
            limits: "sf org list limits --target-org ${org_alias} --json".to_string(),
            last_commit_message: "git log -1 --pretty=%B".to_string(),
            tag: "git tag -a ${version_tag} -m \"Release ${version_tag}\"".to_string(),
            push_tag: "git push origin ${version_tag}".to_string(),
            logout: "sf org logout --target-org ${org_alias} --no-prompt".to_string(),
        }
    }
}

/// Tracking ticket updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TrackerConfig {
    /// Regex matching a ticket id in the latest commit message
    pub ticket_pattern: String,

    /// Tracker REST base URL; transitions are only logged when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the tracker API token
    pub token_env: String,

    /// Workflow state reached after deploying to each environment
    pub states: TicketStates,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            ticket_pattern: r"[A-Z][A-Z0-9]+-\d+".to_string(),
            base_url: None,
            token_env: "TRACKER_API_TOKEN".to_string(),
            states: TicketStates::default(),
        }
    }
}

/// Ticket workflow state names per environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TicketStates {
    pub dev: String,
    pub qa: String,
    pub uat: String,
    pub production: String,
}

impl Default for TicketStates {
    fn default() -> Self {
        Self {
            dev: "In Progress".to_string(),
            qa: "Testing".to_string(),
            uat: "UAT".to_string(),
            production: "Done".to_string(),
        }
    }
}

impl TicketStates {
    /// State a ticket moves to once `environment` is deployed.
    pub fn for_environment(&self, environment: Environment) -> &str {
        match environment {
            Environment::Dev => &self.dev,
            Environment::Qa => &self.qa,
            Environment::Uat => &self.uat,
            Environment::Production => &self.production,
        }
    }
}

/// Approval gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Named approvers per environment; empty allows anyone holding the role
    pub approvers: Approvers,
}

/// Approver allow-lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Approvers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub uat: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub production: Vec<String>,
}

impl Approvers {
    /// Allow-list for `environment`; DEV and QA have none.
    pub fn for_environment(&self, environment: Environment) -> &[String] {
        match environment {
            Environment::Dev | Environment::Qa => &[],
            Environment::Uat => &self.uat,
            Environment::Production => &self.production,
        }
    }
}
