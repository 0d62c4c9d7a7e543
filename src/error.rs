//! Error types for sfpromote operations.
//!
//! This module defines [`PromoteError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `PromoteError` for domain-specific errors that need distinct handling
//! - Use `anyhow::Error` (via `PromoteError::Other`) for unexpected errors
//! - Configuration errors are raised before any external command runs

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sfpromote operations.
#[derive(Debug, Error)]
pub enum PromoteError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Environment name outside DEV, QA, UAT and PRODUCTION.
    #[error("Unknown environment: {value} (expected DEV, QA, UAT or PRODUCTION)")]
    UnknownEnvironment { value: String },

    /// Test level name the deploy CLI does not understand.
    #[error("Unknown test level: {value}")]
    UnknownTestLevel { value: String },

    /// The host secret store did not provide a credential.
    #[error("Credential '{credential}' is not set in the environment")]
    MissingCredential { credential: String },

    /// Another run holds the project lock.
    #[error("Another run is in progress ({holder}); use --break-lock if it is stale")]
    RunInProgress { holder: String },

    /// No run record with the given id.
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// The run is not in a state that allows the requested action.
    #[error("Run {run_id} is {status}: {message}")]
    InvalidRunState {
        run_id: String,
        status: String,
        message: String,
    },

    /// The approver may not approve this environment.
    #[error("{approver} cannot approve {environment}: {message}")]
    ApprovalNotPermitted {
        approver: String,
        environment: String,
        message: String,
    },

    /// Measured coverage is under the configured minimum.
    #[error("Coverage {measured:.2}% is below the required minimum of {minimum:.2}%")]
    CoverageBelowThreshold { measured: f64, minimum: f64 },

    /// Stage execution failed.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    /// Shell command failed to start.
    #[error("Command failed with exit code {code:?}: {command}")]
    CommandFailed { command: String, code: Option<i32> },

    /// Shell command exceeded its time budget and was killed.
    #[error("Command timed out after {seconds}s: {command}")]
    CommandTimedOut { command: String, seconds: u64 },

    /// Ticket tracker request failed.
    #[error("Ticket tracker error: {message}")]
    Tracker { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PromoteError {
    /// Whether this error belongs to the configuration class (exit code 2).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::UnknownEnvironment { .. }
                | Self::UnknownTestLevel { .. }
                | Self::RunInProgress { .. }
        )
    }
}

/// Result type alias for sfpromote operations.
pub type Result<T> = std::result::Result<T, PromoteError>;
