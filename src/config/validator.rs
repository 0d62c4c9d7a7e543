//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - Coverage minimum is a percentage
//! - Approval polling and timeout are positive
//! - Org alias and credential ids are usable
//! - The ticket pattern compiles
//! - Commands the pipeline cannot do without are set

use crate::config::interpolation::extract_variables;
use crate::config::schema::PromoteConfig;
use crate::environment::Environment;
use crate::error::{PromoteError, Result};

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Config key the error refers to
    pub key: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, key: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            key: Some(key.to_string()),
        }
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &PromoteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_settings(config));
    errors.extend(validate_org(config));
    errors.extend(validate_tracker(config));
    errors.extend(validate_commands(config));

    errors
}

fn validate_settings(config: &PromoteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let minimum = config.coverage.minimum;

    if !(0.0..=100.0).contains(&minimum) {
        errors.push(ValidationError::new(
            "coverage-range",
            "coverage.minimum",
            format!("coverage.minimum must be between 0 and 100, got {}", minimum),
        ));
    }

    if config.settings.approval_poll_seconds == 0 {
        errors.push(ValidationError::new(
            "approval-poll",
            "settings.approval_poll_seconds",
            "settings.approval_poll_seconds must be at least 1".to_string(),
        ));
    }

    if config.settings.approval_timeout_minutes == 0 {
        errors.push(ValidationError::new(
            "approval-timeout",
            "settings.approval_timeout_minutes",
            "settings.approval_timeout_minutes must be at least 1".to_string(),
        ));
    }

    if config.settings.history_retention == 0 {
        errors.push(ValidationError::new(
            "history-retention",
            "settings.history_retention",
            "settings.history_retention must keep at least one run".to_string(),
        ));
    }

    errors
}

fn validate_org(config: &PromoteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let alias = &config.org.alias;

    if alias.is_empty() || alias.chars().any(char::is_whitespace) {
        errors.push(ValidationError::new(
            "org-alias",
            "org.alias",
            format!("org.alias '{}' must be a single non-empty word", alias),
        ));
    }

    for environment in Environment::ALL {
        let credential = crate::org::credential_for(config, environment);
        if !is_env_var_name(credential) {
            errors.push(ValidationError::new(
                "credential-id",
                &format!("org.credentials.{}", environment.config_key()),
                format!(
                    "Credential id '{}' for {} is not a valid environment variable name",
                    credential, environment
                ),
            ));
        }
    }

    if let Some(devhub) = &config.org.devhub_credential {
        if !is_env_var_name(devhub) {
            errors.push(ValidationError::new(
                "credential-id",
                "org.devhub_credential",
                format!(
                    "Credential id '{}' is not a valid environment variable name",
                    devhub
                ),
            ));
        }
    }

    errors
}

fn validate_tracker(config: &PromoteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Err(e) = regex::Regex::new(&config.tracker.ticket_pattern) {
        errors.push(ValidationError::new(
            "ticket-pattern",
            "tracker.ticket_pattern",
            format!("tracker.ticket_pattern is not a valid regex: {}", e),
        ));
    }

    if let Some(url) = &config.tracker.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "tracker-url",
                "tracker.base_url",
                format!("tracker.base_url must be an http(s) URL, got '{}'", url),
            ));
        }
    }

    errors
}

fn validate_commands(config: &PromoteConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let commands = &config.commands;

    let required = [
        ("install", &commands.install),
        ("unit_tests", &commands.unit_tests),
        ("login", &commands.login),
        ("validate", &commands.validate),
        ("deploy", &commands.deploy),
        ("tag", &commands.tag),
    ];

    for (name, template) in required {
        if template.trim().is_empty() {
            errors.push(ValidationError::new(
                "missing-command",
                &format!("commands.{}", name),
                format!("commands.{} must not be empty", name),
            ));
        }
    }

    if !commands.login.trim().is_empty()
        && !extract_variables(&commands.login).contains("auth_file")
    {
        errors.push(ValidationError::new(
            "login-auth-file",
            "commands.login",
            "commands.login must read the credential from ${auth_file}".to_string(),
        ));
    }

    errors
}

fn is_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &PromoteConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(PromoteError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
