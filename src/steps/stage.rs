//! The promotion stage table.
//!
//! Stages run strictly in [`Stage::ALL`] order. Whether a stage runs is a
//! pure function of the run parameters; see [`Stage::skip_reason`].

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::environment::{Environment, RunParameters};

/// A named stage of the promotion workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Initialize,
    SetupDependencies,
    CodeQuality,
    UnitTests,
    AuthorizeOrg,
    ValidateDeployment,
    OrgTests,
    Approval,
    Deploy,
    PostDeployValidation,
    UpdateTicket,
    ReleaseTag,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Stage; 12] = [
        Stage::Initialize,
        Stage::SetupDependencies,
        Stage::CodeQuality,
        Stage::UnitTests,
        Stage::AuthorizeOrg,
        Stage::ValidateDeployment,
        Stage::OrgTests,
        Stage::Approval,
        Stage::Deploy,
        Stage::PostDeployValidation,
        Stage::UpdateTicket,
        Stage::ReleaseTag,
    ];

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "Initialize",
            Self::SetupDependencies => "Setup Dependencies",
            Self::CodeQuality => "Code Quality & Security",
            Self::UnitTests => "Unit Tests",
            Self::AuthorizeOrg => "Authorize Org",
            Self::ValidateDeployment => "Validate Deployment",
            Self::OrgTests => "Run Org-Side Tests",
            Self::Approval => "Approval Gate",
            Self::Deploy => "Deploy",
            Self::PostDeployValidation => "Post-Deployment Validation",
            Self::UpdateTicket => "Update Tracking Ticket",
            Self::ReleaseTag => "Create Release Tag",
        }
    }

    /// Kebab-case identifier used in logs and artifact names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::SetupDependencies => "setup-dependencies",
            Self::CodeQuality => "code-quality",
            Self::UnitTests => "unit-tests",
            Self::AuthorizeOrg => "authorize-org",
            Self::ValidateDeployment => "validate-deployment",
            Self::OrgTests => "org-tests",
            Self::Approval => "approval",
            Self::Deploy => "deploy",
            Self::PostDeployValidation => "post-deploy-validation",
            Self::UpdateTicket => "update-ticket",
            Self::ReleaseTag => "release-tag",
        }
    }

    /// Why this stage does not run for `params`, or `None` when it runs.
    pub fn skip_reason(&self, params: &RunParameters) -> Option<&'static str> {
        let env = params.environment;
        match self {
            Self::Initialize | Self::AuthorizeOrg | Self::Deploy => None,
            Self::PostDeployValidation | Self::UpdateTicket => None,
            Self::SetupDependencies if params.deploy_only => Some("deploy only"),
            Self::SetupDependencies => None,
            Self::CodeQuality if params.deploy_only => Some("deploy only"),
            Self::CodeQuality if params.skip_code_analysis => Some("code analysis skipped"),
            Self::CodeQuality => None,
            Self::UnitTests | Self::OrgTests if params.deploy_only => Some("deploy only"),
            Self::UnitTests | Self::OrgTests if !params.run_tests => Some("tests disabled"),
            Self::UnitTests | Self::OrgTests => None,
            Self::ValidateDeployment if !env.validates_before_deploy() => {
                Some("not validated in DEV")
            }
            Self::ValidateDeployment => None,
            Self::Approval if !env.requires_approval() => Some("no approval required"),
            Self::Approval => None,
            Self::ReleaseTag if params.release_tag().is_none() => Some("no version tag"),
            Self::ReleaseTag if env != Environment::Production => {
                Some("tags are created for PRODUCTION only")
            }
            Self::ReleaseTag => None,
        }
    }

    /// Whether this stage runs for `params`.
    pub fn runs_for(&self, params: &RunParameters) -> bool {
        self.skip_reason(params).is_none()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One line of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub skip_reason: Option<&'static str>,
}

/// Run/skip decision for every stage, in order.
pub fn plan(params: &RunParameters) -> Vec<PlannedStage> {
    Stage::ALL
        .iter()
        .map(|stage| PlannedStage {
            stage: *stage,
            skip_reason: stage.skip_reason(params),
        })
        .collect()
}
