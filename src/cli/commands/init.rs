//! Init command implementation.
//!
//! The `sfpromote init` command writes the default configuration so every
//! command template is visible and editable.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::args::InitArgs;
use crate::config::{project_config_path, PromoteConfig, CONFIG_DIR};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// Entries that hold per-machine state and should not be committed.
const GITIGNORE_ENTRIES: [&str; 3] = [
    ".sfpromote/config.local.yml",
    ".sfpromote/runs/",
    ".sfpromote/run.lock",
];

/// The init command implementation.
pub struct InitCommand {
    project_root: PathBuf,
    args: InitArgs,
}

impl InitCommand {
    /// Create a new init command.
    pub fn new(project_root: &Path, args: InitArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// Get the project root path.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    fn config_exists(&self) -> bool {
        project_config_path(&self.project_root).exists()
    }

    /// Default configuration with a short header.
    fn create_config(&self) -> Result<String> {
        let project_name = self
            .project_root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("project");

        let body = serde_yaml::to_string(&PromoteConfig::default()).map_err(anyhow::Error::from)?;

        Ok(format!(
            "# sfpromote configuration for {project_name}\n\
             #\n\
             # Command templates may reference ${{org_alias}}, ${{devhub_alias}},\n\
             # ${{environment}}, ${{test_level}}, ${{tests_arg}}, ${{version_tag}},\n\
             # ${{run_dir}}, ${{artifacts_dir}} and ${{auth_file}}.\n\
             # Leave a check blank to skip it.\n\
             #\n\
             # Credentials name environment variables holding SFDX auth URLs;\n\
             # the secrets themselves never belong in this file.\n\
             \n\
             {body}"
        ))
    }

    fn update_gitignore(&self, ui: &mut dyn UserInterface) -> Result<()> {
        let gitignore_path = self.project_root.join(".gitignore");
        if !gitignore_path.exists() {
            return Ok(());
        }

        let mut content = fs::read_to_string(&gitignore_path)?;
        let missing: Vec<&str> = GITIGNORE_ENTRIES
            .iter()
            .copied()
            .filter(|entry| !content.lines().any(|line| line.trim() == *entry))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for entry in &missing {
            content.push_str(entry);
            content.push('\n');
        }
        fs::write(&gitignore_path, content)?;
        ui.message(&format!("Added {} to .gitignore", missing.join(", ")));

        Ok(())
    }
}

impl Command for InitCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if self.config_exists() && !self.args.force {
            ui.warning("Configuration already exists. Use --force to overwrite.");
            return Ok(CommandResult::failure(1));
        }

        let config = self.create_config()?;
        fs::create_dir_all(self.project_root.join(CONFIG_DIR))?;
        fs::write(project_config_path(&self.project_root), config)?;

        self.update_gitignore(ui)?;

        ui.success("Created .sfpromote/config.yml");
        ui.message("\nNext steps:");
        ui.message("  1. Review the command templates and credentials");
        ui.message("  2. Run `sfpromote run --env DEV --dry-run` to see the plan");

        Ok(CommandResult::success())
    }
}
