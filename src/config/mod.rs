//! Configuration loading, parsing, and validation for sfpromote.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//! - Command template interpolation in [`interpolation`]
//!
//! # Example
//!
//! ```
//! use sfpromote::config::{load_merged_config, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! let config_dir = temp.path().join(".sfpromote");
//! fs::create_dir_all(&config_dir).unwrap();
//! fs::write(config_dir.join("config.yml"), "project_name: acme").unwrap();
//!
//! let config = load_merged_config(temp.path()).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.project_name, Some("acme".to_string()));
//! ```
//!
//! # Configuration File Locations
//!
//! sfpromote merges configuration in this order:
//! 1. Built-in defaults
//! 2. Project config (`.sfpromote/config.yml`)
//! 3. Local overrides (`.sfpromote/config.local.yml`)

pub mod interpolation;
pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use schema::{
    ApprovalConfig, Approvers, Commands, CoverageConfig, CoverageMetric, Credentials, OrgConfig,
    PromoteConfig, Settings, TicketStates, TrackerConfig,
};

pub use loader::{
    find_project_root, load_config, load_config_file, load_config_value, load_merged_config,
    parse_config, project_config_path, ConfigPaths, CONFIG_DIR,
};

pub use merger::{deep_merge, merge_configs};

pub use validator::{validate, validate_config, ValidationError};

pub use interpolation::{
    extract_variables, parse_interpolation, resolve_string, InterpolationContext, Segment,
};
