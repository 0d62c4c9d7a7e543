//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// sfpromote - Salesforce DX environment promotion.
#[derive(Debug, Parser)]
#[command(name = "sfpromote")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides .sfpromote/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to project root (overrides current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Stream command output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Promote the project to an environment
    Run(RunArgs),

    /// Continue a run parked at the approval gate
    Resume(ResumeArgs),

    /// Approve a run waiting at the approval gate
    Approve(ApproveArgs),

    /// Reject a run waiting at the approval gate
    Reject(RejectArgs),

    /// List past runs
    History(HistoryArgs),

    /// Show one run in detail
    Show(ShowArgs),

    /// Write the default configuration
    Init(InitArgs),

    /// Show resolved configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
///
/// Every run parameter falls back to the variable a CI job would export.
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Target environment: DEV, QA, UAT or PRODUCTION
    #[arg(long = "env", env = "ENVIRONMENT", value_name = "ENV")]
    pub environment: String,

    /// Run unit and org tests
    #[arg(long, env = "RUN_TESTS", default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new(), value_name = "BOOL")]
    pub run_tests: bool,

    /// Skip the code quality and security checks
    #[arg(long, env = "SKIP_CODE_ANALYSIS", default_value = "false", action = ArgAction::Set, value_parser = BoolishValueParser::new(), value_name = "BOOL")]
    pub skip_code_analysis: bool,

    /// Only authorize and deploy
    #[arg(long, env = "DEPLOY_ONLY", default_value = "false", action = ArgAction::Set, value_parser = BoolishValueParser::new(), value_name = "BOOL")]
    pub deploy_only: bool,

    /// Deploy test level
    #[arg(long, env = "TEST_LEVEL", default_value = "RunLocalTests", value_name = "LEVEL")]
    pub test_level: String,

    /// Test classes for RunSpecifiedTests (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub tests: Vec<String>,

    /// Tag to create after a production deploy
    #[arg(long, env = "VERSION_TAG", value_name = "TAG")]
    pub version_tag: Option<String>,

    /// Print the stage plan without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Park the run at the approval gate instead of waiting
    #[arg(long)]
    pub detach_approval: bool,

    /// Remove a stale run lock first
    #[arg(long)]
    pub break_lock: bool,
}

impl RunArgs {
    /// Arguments with the CI defaults for `environment`.
    pub fn for_environment(environment: &str) -> Self {
        Self {
            environment: environment.to_string(),
            run_tests: true,
            skip_code_analysis: false,
            deploy_only: false,
            test_level: "RunLocalTests".to_string(),
            tests: Vec::new(),
            version_tag: None,
            dry_run: false,
            detach_approval: false,
            break_lock: false,
        }
    }
}

/// Arguments for the `resume` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ResumeArgs {
    /// Run to continue
    pub run_id: String,

    /// Wait for a decision instead of parking again
    #[arg(long)]
    pub wait: bool,
}

/// Arguments for the `approve` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ApproveArgs {
    /// Run to approve
    pub run_id: String,

    /// Name of the approver
    #[arg(long)]
    pub approver: String,

    /// Approver role: tech-lead or release-manager
    #[arg(long)]
    pub role: String,

    /// Comment stored with the decision
    #[arg(long)]
    pub comment: Option<String>,
}

/// Arguments for the `reject` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RejectArgs {
    /// Run to reject
    pub run_id: String,

    /// Name of the approver
    #[arg(long)]
    pub approver: String,

    /// Reason stored with the decision
    #[arg(long)]
    pub reason: Option<String>,
}

/// Arguments for the `history` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct HistoryArgs {
    /// Number of runs to show
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only runs against this environment
    #[arg(long, value_name = "ENV")]
    pub env: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `show` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ShowArgs {
    /// Run to show (latest when omitted)
    pub run_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Include captured command output
    #[arg(long)]
    pub output: bool,
}

/// Arguments for the `init` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct InitArgs {
    /// Overwrite existing configuration
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the JSON Schema of the config file
    #[arg(long)]
    pub schema: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
