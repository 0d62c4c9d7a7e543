//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::config::{load_config, validate, PromoteConfig};
use crate::error::Result;
use crate::state::{RunStatus, RunStore};
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Result reflecting where a run ended up.
    pub fn for_run(status: RunStatus) -> Self {
        match status.exit_code() {
            0 => Self::success(),
            code => Self::failure(code),
        }
    }
}

/// Where a command finds its project.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub config_override: Option<PathBuf>,
}

impl ProjectContext {
    pub fn new(root: &Path, config_override: Option<&Path>) -> Self {
        Self {
            root: root.to_path_buf(),
            config_override: config_override.map(Path::to_path_buf),
        }
    }

    /// Load and validate the configuration.
    pub fn load_config(&self) -> Result<PromoteConfig> {
        let config = load_config(&self.root, self.config_override.as_deref())?;
        validate(&config)?;
        Ok(config)
    }

    /// Run store for `config`.
    pub fn store(&self, config: &PromoteConfig) -> RunStore {
        RunStore::new(&self.root.join(&config.settings.work_dir))
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project: ProjectContext,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given project root.
    pub fn new(project_root: PathBuf, config_override: Option<PathBuf>) -> Self {
        Self {
            project: ProjectContext {
                root: project_root,
                config_override,
            },
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project.root
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let project = self.project.clone();
        match &cli.command {
            Commands::Run(args) => super::run::RunCommand::new(project, args.clone()).execute(ui),
            Commands::Resume(args) => {
                super::resume::ResumeCommand::new(project, args.clone()).execute(ui)
            }
            Commands::Approve(args) => {
                super::approve::ApproveCommand::new(project, args.clone()).execute(ui)
            }
            Commands::Reject(args) => {
                super::approve::RejectCommand::new(project, args.clone()).execute(ui)
            }
            Commands::History(args) => {
                super::history::HistoryCommand::new(project, args.clone()).execute(ui)
            }
            Commands::Show(args) => super::show::ShowCommand::new(project, args.clone()).execute(ui),
            Commands::Init(args) => {
                super::init::InitCommand::new(&project.root, args.clone()).execute(ui)
            }
            Commands::Config(args) => {
                super::config::ConfigCommand::new(project, args.clone()).execute(ui)
            }
            Commands::Completions(args) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(ui)
            }
        }
    }
}
