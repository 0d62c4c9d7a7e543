//! sfpromote - Salesforce DX environment promotion.
//!
//! sfpromote drives a Salesforce DX project through a fixed pipeline of
//! stages (code quality, unit tests, validation, approval, deploy, release
//! tagging) against one of four environments, keeping a persisted record of
//! every run.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Configuration loading, parsing, and validation
//! - [`environment`] - Target environments and run parameters
//! - [`error`] - Error types and result aliases
//! - [`gate`] - Approval, coverage and org limit gates
//! - [`org`] - Org credentials and the authorized session
//! - [`runner`] - Pipeline execution and cleanup
//! - [`secrets`] - Output masking for credentials
//! - [`shell`] - Shell command execution
//! - [`state`] - Run records, the run store and the run lock
//! - [`steps`] - Stage definitions and the run plan
//! - [`tracker`] - Ticket extraction and tracker updates
//! - [`ui`] - Interactive prompts, spinners, and terminal output
//!
//! # Example
//!
//! ```
//! use sfpromote::environment::{Environment, RunParameters};
//! use sfpromote::steps::{plan, Stage};
//!
//! let params = RunParameters::new(Environment::Production);
//! let approval = plan(&params)
//!     .into_iter()
//!     .find(|planned| planned.stage == Stage::Approval)
//!     .unwrap();
//! assert!(approval.skip_reason.is_none());
//! ```

pub mod cli;
pub mod config;
pub mod environment;
pub mod error;
pub mod gate;
pub mod org;
pub mod runner;
pub mod secrets;
pub mod shell;
pub mod state;
pub mod steps;
pub mod tracker;
pub mod ui;

pub use error::{PromoteError, Result};
