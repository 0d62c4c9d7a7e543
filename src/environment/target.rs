//! Target org environments.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::PromoteError;

/// An org environment a run can promote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    Dev,
    Qa,
    Uat,
    Production,
}

impl Environment {
    /// All environments in promotion order.
    pub const ALL: [Environment; 4] = [
        Environment::Dev,
        Environment::Qa,
        Environment::Uat,
        Environment::Production,
    ];

    /// Upper-case name as passed by the CI host.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dev => "DEV",
            Self::Qa => "QA",
            Self::Uat => "UAT",
            Self::Production => "PRODUCTION",
        }
    }

    /// Lower-case key used for per-environment config maps.
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Qa => "qa",
            Self::Uat => "uat",
            Self::Production => "production",
        }
    }

    /// Whether promotion needs a human approval before deploying.
    pub fn requires_approval(&self) -> bool {
        self.approver_role().is_some()
    }

    /// Role an approver must hold, if approval is required.
    pub fn approver_role(&self) -> Option<ApproverRole> {
        match self {
            Self::Dev | Self::Qa => None,
            Self::Uat => Some(ApproverRole::TechLead),
            Self::Production => Some(ApproverRole::ReleaseManager),
        }
    }

    /// Whether a dry-run validation precedes the real deployment.
    pub fn validates_before_deploy(&self) -> bool {
        match self {
            Self::Dev => false,
            Self::Qa | Self::Uat | Self::Production => true,
        }
    }

    /// Whether the current org metadata is retrieved as a backup before deploying.
    pub fn backs_up_before_deploy(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Environment {
    type Err = PromoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEV" => Ok(Self::Dev),
            "QA" => Ok(Self::Qa),
            "UAT" => Ok(Self::Uat),
            "PRODUCTION" => Ok(Self::Production),
            _ => Err(PromoteError::UnknownEnvironment {
                value: s.to_string(),
            }),
        }
    }
}

/// Role held by someone approving a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ApproverRole {
    TechLead,
    ReleaseManager,
}

impl ApproverRole {
    /// Kebab-case role name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TechLead => "tech-lead",
            Self::ReleaseManager => "release-manager",
        }
    }

    /// Whether holding this role is enough for the `required` one.
    ///
    /// A release manager may stand in for a tech lead, not the reverse.
    pub fn satisfies(&self, required: ApproverRole) -> bool {
        match (self, required) {
            (Self::ReleaseManager, _) => true,
            (Self::TechLead, Self::TechLead) => true,
            (Self::TechLead, Self::ReleaseManager) => false,
        }
    }
}

impl fmt::Display for ApproverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ApproverRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "tech-lead" => Ok(Self::TechLead),
            "release-manager" => Ok(Self::ReleaseManager),
            other => Err(format!(
                "unknown approver role: {} (expected tech-lead or release-manager)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_environments_case_insensitively() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("QA".parse::<Environment>().unwrap(), Environment::Qa);
        assert_eq!(" Uat ".parse::<Environment>().unwrap(), Environment::Uat);
        assert_eq!(
            "PRODUCTION".parse::<Environment>().unwrap(),
            Environment::Production
        );
    }

    #[test]
    fn unknown_environment_is_fatal_error() {
        let err = "STAGING".parse::<Environment>().unwrap_err();
        assert!(matches!(err, PromoteError::UnknownEnvironment { ref value } if value == "STAGING"));
        assert!(err.is_configuration());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for env in Environment::ALL {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }

    #[test]
    fn only_higher_environments_require_approval() {
        assert!(!Environment::Dev.requires_approval());
        assert!(!Environment::Qa.requires_approval());
        assert_eq!(
            Environment::Uat.approver_role(),
            Some(ApproverRole::TechLead)
        );
        assert_eq!(
            Environment::Production.approver_role(),
            Some(ApproverRole::ReleaseManager)
        );
    }

    #[test]
    fn dev_skips_validation() {
        assert!(!Environment::Dev.validates_before_deploy());
        assert!(Environment::Qa.validates_before_deploy());
        assert!(Environment::Production.validates_before_deploy());
    }

    #[test]
    fn only_production_backs_up() {
        let backed_up: Vec<_> = Environment::ALL
            .iter()
            .filter(|e| e.backs_up_before_deploy())
            .collect();
        assert_eq!(backed_up, vec![&Environment::Production]);
    }

    #[test]
    fn release_manager_covers_tech_lead() {
        assert!(ApproverRole::ReleaseManager.satisfies(ApproverRole::TechLead));
        assert!(ApproverRole::TechLead.satisfies(ApproverRole::TechLead));
        assert!(!ApproverRole::TechLead.satisfies(ApproverRole::ReleaseManager));
    }

    #[test]
    fn approver_role_parses_both_spellings() {
        assert_eq!(
            "release_manager".parse::<ApproverRole>().unwrap(),
            ApproverRole::ReleaseManager
        );
        assert_eq!(
            "Tech-Lead".parse::<ApproverRole>().unwrap(),
            ApproverRole::TechLead
        );
        assert!("admin".parse::<ApproverRole>().is_err());
    }

    #[test]
    fn environment_serializes_upper_case() {
        let yaml = serde_yaml::to_string(&Environment::Production).unwrap();
        assert_eq!(yaml.trim(), "PRODUCTION");
    }
}
