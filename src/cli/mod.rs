//! Command-line interface for sfpromote.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{
    ApproveArgs, Cli, Commands, CompletionsArgs, ConfigArgs, HistoryArgs, InitArgs, RejectArgs,
    ResumeArgs, RunArgs, ShowArgs,
};
pub use commands::{Command, CommandDispatcher, CommandResult, ProjectContext};
