//! Pipeline execution.
//!
//! [`PipelineRunner`] owns the stage walk; [`invoke`] applies the
//! fatal/tolerated policy to each command and [`cleanup`] releases the org
//! session at the end of every invocation.

pub mod cleanup;
pub mod console;
pub mod invoke;
pub mod pipeline;
pub mod reports;

pub use cleanup::{cleanup, CleanupPlan, CleanupReport};
pub use console::ConsoleLog;
pub use invoke::{StageShell, Tolerance};
pub use pipeline::{PipelineRunner, RunOptions};
pub use reports::{parse_deploy_summary, parse_org_test_summary, DeploySummary, OrgTestSummary};
