//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`sfpromote run`, `sfpromote approve`)
//! - Shared config loading through [`ProjectContext`]
//! - Consistent global flag handling

pub mod approve;
pub mod completions;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod history;
pub mod init;
pub mod resume;
pub mod run;
pub mod show;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, ProjectContext};
