//! Run parameters supplied by the CI trigger.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{PromoteError, Result};

use super::Environment;

/// Which server-side tests run during a deploy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TestLevel {
    NoTestRun,
    RunSpecifiedTests,
    #[default]
    RunLocalTests,
    RunAllTestsInOrg,
}

impl TestLevel {
    /// Name as understood by the deploy CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoTestRun => "NoTestRun",
            Self::RunSpecifiedTests => "RunSpecifiedTests",
            Self::RunLocalTests => "RunLocalTests",
            Self::RunAllTestsInOrg => "RunAllTestsInOrg",
        }
    }
}

impl fmt::Display for TestLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TestLevel {
    type Err = PromoteError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "NoTestRun" => Ok(Self::NoTestRun),
            "RunSpecifiedTests" => Ok(Self::RunSpecifiedTests),
            "RunLocalTests" => Ok(Self::RunLocalTests),
            "RunAllTestsInOrg" => Ok(Self::RunAllTestsInOrg),
            other => Err(PromoteError::UnknownTestLevel {
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable parameters for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunParameters {
    pub environment: Environment,
    pub run_tests: bool,
    pub skip_code_analysis: bool,
    pub deploy_only: bool,
    pub test_level: TestLevel,
    /// Apex test classes for `RunSpecifiedTests`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specified_tests: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_tag: Option<String>,
}

impl RunParameters {
    /// Parameters with the CI defaults for the given environment.
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            run_tests: true,
            skip_code_analysis: false,
            deploy_only: false,
            test_level: TestLevel::default(),
            specified_tests: Vec::new(),
            version_tag: None,
        }
    }

    /// Check cross-field constraints.
    ///
    /// A blank version tag is normalized to "not supplied".
    pub fn validated(mut self) -> Result<Self> {
        self.version_tag = self
            .version_tag
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let Some(tag) = &self.version_tag {
            check_tag_name(tag)?;
        }

        if let Some(test) = self
            .specified_tests
            .iter()
            .find(|test| !is_test_class_name(test))
        {
            return Err(PromoteError::ConfigValidationError {
                message: format!(
                    "test class '{}' is not a valid Apex class name (letters, digits and _)",
                    test
                ),
            });
        }

        if self.test_level == TestLevel::RunSpecifiedTests && self.specified_tests.is_empty() {
            return Err(PromoteError::ConfigValidationError {
                message: "RunSpecifiedTests requires at least one test class (--tests)".into(),
            });
        }

        Ok(self)
    }

    /// The version tag to create, if any.
    pub fn release_tag(&self) -> Option<&str> {
        self.version_tag.as_deref()
    }

    /// Human-readable run description.
    pub fn describe(&self) -> String {
        let mut parts = vec![format!("{} deploy", self.environment)];
        if self.deploy_only {
            parts.push("deploy only".to_string());
        } else if self.run_tests {
            parts.push("with tests".to_string());
        }
        parts.push(self.test_level.to_string());
        if let Some(tag) = &self.version_tag {
            parts.push(tag.clone());
        }
        parts.join(" · ")
    }
}

/// Apex class names: letters, digits and underscores.
fn is_test_class_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject tag names git would refuse or the shell would interpret.
///
/// Follows `git check-ref-format`, narrowed to `[A-Za-z0-9._/+-]`.
fn check_tag_name(tag: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(PromoteError::ConfigValidationError {
            message: format!("version tag '{}' is not a valid tag name: {}", tag, reason),
        })
    };

    if let Some(c) = tag
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '+' | '-')))
    {
        return invalid(&format!("character {:?} is not allowed", c));
    }
    if tag.starts_with('-') {
        return invalid("it starts with '-'");
    }
    if tag.contains("..") || tag.contains("//") {
        return invalid("it contains '..' or '//'");
    }
    if tag.ends_with('.') || tag.ends_with('/') || tag.starts_with('/') {
        return invalid("it starts or ends with a separator");
    }
    if tag
        .split('/')
        .any(|part| part.starts_with('.') || part.ends_with(".lock"))
    {
        return invalid("a component starts with '.' or ends with '.lock'");
    }
    Ok(())
}
