//! Config command implementation.
//!
//! The `sfpromote config` command shows resolved configuration, or the JSON
//! Schema of the config file with `--schema`.

use crate::cli::args::ConfigArgs;
use crate::config::{ConfigPaths, PromoteConfig};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, ProjectContext};

/// The config command implementation.
pub struct ConfigCommand {
    project: ProjectContext,
    args: ConfigArgs,
}

impl ConfigCommand {
    /// Create a new config command.
    pub fn new(project: ProjectContext, args: ConfigArgs) -> Self {
        Self { project, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ConfigArgs {
        &self.args
    }
}

impl Command for ConfigCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        if self.args.schema {
            let schema = schemars::schema_for!(PromoteConfig);
            let json = serde_json::to_string_pretty(&schema).map_err(anyhow::Error::from)?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        let config = self.project.load_config()?;

        if self.args.json {
            let json = serde_json::to_string_pretty(&config).map_err(anyhow::Error::from)?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        // Show config file path(s)
        let sources: Vec<String> = match &self.project.config_override {
            Some(path) => vec![path.display().to_string()],
            None => ConfigPaths::discover(&self.project.root)
                .all_existing()
                .into_iter()
                .map(|path| path.display().to_string())
                .collect(),
        };
        if sources.is_empty() {
            ui.message("# built-in defaults (run `sfpromote init` to write them out)");
        }
        for source in &sources {
            ui.message(&format!("# {}", source));
        }
        ui.message("");

        let yaml = serde_yaml::to_string(&config).map_err(anyhow::Error::from)?;
        ui.message(&yaml);

        Ok(CommandResult::success())
    }
}
