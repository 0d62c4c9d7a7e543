//! Configuration file discovery and loading.
//!
//! This module handles finding and loading configuration files in the
//! correct priority order.

use crate::config::merger::merge_configs;
use crate::config::schema::PromoteConfig;
use crate::error::{PromoteError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the project's sfpromote configuration.
pub const CONFIG_DIR: &str = ".sfpromote";

/// Paths to configuration files in priority order (later overrides earlier).
///
/// Merge order:
/// 1. Project config (`.sfpromote/config.yml`)
/// 2. Local overrides (`.sfpromote/config.local.yml`)
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project config: .sfpromote/config.yml
    pub project: Option<PathBuf>,

    /// Local overrides: .sfpromote/config.local.yml
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path) -> Self {
        Self {
            project: existing(project_config_path(project_root)),
            project_local: existing(project_root.join(CONFIG_DIR).join("config.local.yml")),
        }
    }

    /// Returns all existing config paths in merge order.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        self.project.iter().chain(self.project_local.iter()).collect()
    }

    /// Check if any project config exists.
    pub fn has_project_config(&self) -> bool {
        self.project.is_some()
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}

/// Location of the project config, whether or not it exists.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR).join("config.yml")
}

/// Find the project root by walking up from `start`.
///
/// Looks for, in order at each level:
/// 1. `.sfpromote` directory
/// 2. `sfdx-project.json`
/// 3. `.git` directory
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir()
            || current.join("sfdx-project.json").is_file()
            || current.join(".git").exists()
        {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load a single config file and parse it into PromoteConfig.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<PromoteConfig> {
    let value = load_config_value(path)?;
    from_value(value, path)
}

/// Parse YAML content into PromoteConfig.
pub fn parse_config(content: &str, source_path: &Path) -> Result<PromoteConfig> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| PromoteError::ConfigParseError {
            path: source_path.to_path_buf(),
            message: e.to_string(),
        })?;
    from_value(value, source_path)
}

/// Load a config file as raw YAML Value (for merging).
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PromoteError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PromoteError::Io(e)
        }
    })?;

    serde_yaml::from_str(&content).map_err(|e| PromoteError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

// An empty document parses as null; treat it like an empty mapping.
fn from_value(value: serde_yaml::Value, source_path: &Path) -> Result<PromoteConfig> {
    let value = if value.is_null() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        value
    };
    serde_yaml::from_value(value).map_err(|e| PromoteError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load and merge the project config and its local overrides.
///
/// A project without `.sfpromote/config.yml` runs on built-in defaults,
/// still honouring a `config.local.yml` if one exists.
///
/// # Errors
///
/// Returns `ConfigParseError` if any config file is invalid.
pub fn load_merged_config(project_root: &Path) -> Result<PromoteConfig> {
    let paths = ConfigPaths::discover(project_root);

    let mut configs = Vec::new();
    for path in paths.all_existing() {
        let value = load_config_value(path)?;
        if !value.is_null() {
            configs.push(value);
        }
    }

    if configs.is_empty() {
        tracing::debug!("no config found under {}, using defaults", project_root.display());
        return Ok(PromoteConfig::default());
    }

    let merged = merge_configs(&configs);

    serde_yaml::from_value(merged).map_err(|e| PromoteError::ConfigParseError {
        path: project_config_path(project_root),
        message: format!("Failed to parse merged config: {}", e),
    })
}

/// Load config with optional path override.
///
/// If `config_override` is provided, loads only that file without merging.
/// Otherwise, discovers and merges all config files.
pub fn load_config(project_root: &Path, config_override: Option<&Path>) -> Result<PromoteConfig> {
    if let Some(override_path) = config_override {
        load_config_file(override_path)
    } else {
        load_merged_config(project_root)
    }
}
