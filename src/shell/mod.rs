//! Shell command execution and CI host detection.

pub mod command;
pub mod platform;
pub mod quote;

pub use command::{
    execute, execute_quiet, execute_streaming, extract_json, CommandOptions, CommandResult, CommandRunner,
    OutputCallback, OutputLine, ShellRunner,
};
pub use platform::{build_url, is_ci, make_private};
pub use quote::quote_arg;
