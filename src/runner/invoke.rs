//! Running stage commands and applying their failure policy.

use std::path::Path;
use std::time::Duration;

use crate::error::{PromoteError, Result};
use crate::secrets::OutputMasker;
use crate::shell::{CommandOptions, CommandResult, CommandRunner};
use crate::steps::StageRecorder;
use crate::ui::UserInterface;

use super::console::ConsoleLog;

/// What a non-zero exit does to the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Fail the stage and stop the run.
    Fatal,
    /// Warn and carry on, marking the stage unstable when configured.
    Tolerated,
}

/// Runs commands for the pipeline: masks their output, writes it to the
/// console log and applies the [`Tolerance`] of each call.
pub struct StageShell<'a> {
    commands: &'a dyn CommandRunner,
    options: CommandOptions,
    masker: OutputMasker,
    console: ConsoleLog,
    mark_unstable: bool,
}

impl<'a> StageShell<'a> {
    pub fn new(
        commands: &'a dyn CommandRunner,
        project_root: &Path,
        timeout_secs: Option<u64>,
        masker: OutputMasker,
        console: ConsoleLog,
        mark_unstable: bool,
    ) -> Self {
        Self {
            commands,
            options: CommandOptions::captured(project_root).with_timeout(timeout_secs),
            masker,
            console,
            mark_unstable,
        }
    }

    pub fn masker(&self) -> &OutputMasker {
        &self.masker
    }

    pub fn console(&mut self) -> &mut ConsoleLog {
        &mut self.console
    }

    /// Run `command` and return its result with output already masked.
    ///
    /// Spawn failures and timeouts come back as a failed result so that the
    /// caller's tolerance decides what they mean.
    pub fn run(&mut self, command: &str) -> CommandResult {
        self.console.command(command);
        let result = self.commands.run(command, &self.options);
        self.record(result)
    }

    /// Run several independent commands concurrently and return their
    /// results in the order given. Blank entries are not run.
    pub fn run_parallel(&mut self, commands: &[(&str, String)]) -> Vec<Option<CommandResult>> {
        let runner = self.commands;
        let options = &self.options;

        let raw: Vec<Option<Result<CommandResult>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = commands
                .iter()
                .map(|(_, command)| {
                    (!command.trim().is_empty())
                        .then(|| scope.spawn(move || runner.run(command, options)))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(PromoteError::Other(anyhow::anyhow!("check panicked")))
                        })
                    })
                })
                .collect()
        });

        commands
            .iter()
            .zip(raw)
            .map(|((label, command), result)| {
                result.map(|result| {
                    self.console.section(label);
                    self.console.command(command);
                    self.record(result)
                })
            })
            .collect()
    }

    fn record(&mut self, result: Result<CommandResult>) -> CommandResult {
        let result = match result {
            Ok(result) => result,
            Err(e) => CommandResult::failure(None, String::new(), e.to_string(), Duration::ZERO),
        };

        let masked = CommandResult {
            stdout: self.masker.mask(&result.stdout),
            stderr: self.masker.mask(&result.stderr),
            ..result
        };
        let output = masked.combined_output();
        if !output.is_empty() {
            self.console.line(&output);
        }
        masked
    }

    /// Apply `tolerance` to a finished command.
    ///
    /// Output is added to the stage record. A fatal failure shows the
    /// command and its output and returns `StageFailed`; a tolerated one
    /// warns and downgrades the stage.
    pub fn check(
        &self,
        recorder: &mut StageRecorder,
        ui: &mut dyn UserInterface,
        label: &str,
        command: &str,
        result: &CommandResult,
        tolerance: Tolerance,
    ) -> Result<()> {
        recorder.append_output(&result.combined_output());

        if result.success {
            return Ok(());
        }

        let status = match result.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "no exit code".to_string(),
        };

        match tolerance {
            Tolerance::Fatal => {
                ui.show_error_block(command, &result.combined_output());
                Err(PromoteError::StageFailed {
                    stage: recorder.stage().name().to_string(),
                    message: format!("{} failed ({})", label, status),
                })
            }
            Tolerance::Tolerated => {
                let note = format!("{} failed ({}), continuing", label, status);
                ui.warning(&note);
                tracing::warn!(stage = recorder.stage().slug(), "{}", note);
                if self.mark_unstable {
                    recorder.mark_unstable(note);
                } else {
                    recorder.note(note);
                }
                Ok(())
            }
        }
    }

    /// Run and check in one go.
    pub fn exec(
        &mut self,
        recorder: &mut StageRecorder,
        ui: &mut dyn UserInterface,
        label: &str,
        command: &str,
        tolerance: Tolerance,
    ) -> Result<CommandResult> {
        let result = self.run(command);
        self.check(recorder, ui, label, command, &result, tolerance)?;
        Ok(result)
    }
}
