//! The full, masked log of a run.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::secrets::{MaskingWriter, OutputMasker};

/// Appends masked command output to `<run_dir>/console.log`.
///
/// Write failures are logged once and then ignored; a broken log never
/// fails a deployment.
pub struct ConsoleLog {
    path: PathBuf,
    writer: Option<MaskingWriter<File>>,
}

impl ConsoleLog {
    /// Open (or continue) the log at `path`.
    pub fn open(path: &Path, masker: &OutputMasker) -> Self {
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map(|file| masker.writer(file));

        match writer {
            Ok(writer) => Self {
                path: path.to_path_buf(),
                writer: Some(writer),
            },
            Err(e) => {
                tracing::warn!("cannot open console log {}: {}", path.display(), e);
                Self::disabled(path)
            }
        }
    }

    /// A log that drops everything.
    pub fn disabled(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a section for a stage or phase.
    pub fn section(&mut self, title: &str) {
        self.write(&format!(
            "\n==== {} [{}] ====\n",
            title,
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        ));
    }

    /// Log the command line about to run.
    pub fn command(&mut self, command: &str) {
        self.write(&format!("$ {}\n", command));
    }

    /// Log a line of text; a trailing newline is added when missing.
    pub fn line(&mut self, text: &str) {
        if text.ends_with('\n') {
            self.write(text);
        } else {
            self.write(&format!("{}\n", text));
        }
    }

    fn write(&mut self, text: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = writer
            .write_all(text.as_bytes())
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            tracing::warn!("console log {} disabled: {}", self.path.display(), e);
            self.writer = None;
        }
    }
}
