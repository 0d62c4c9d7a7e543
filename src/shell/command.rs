//! Shell command execution.

use crate::error::{PromoteError, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether command succeeded (exit code 0).
    pub success: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
        }
    }

    /// Stdout followed by stderr, for logs.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }

    /// The JSON document printed on stdout, if any.
    ///
    /// Org CLIs may print warnings before or after `--json` output, so this
    /// takes the span from the first `{` to the last `}`.
    pub fn json_payload(&self) -> Option<&str> {
        extract_json(&self.stdout)
    }
}

/// Span from the first `{` to the last `}` of `text`.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Capture stdout (if false, inherits from parent).
    pub capture_stdout: bool,

    /// Capture stderr (if false, inherits from parent).
    pub capture_stderr: bool,

    /// Timeout in seconds (None = no timeout).
    pub timeout: Option<u64>,
}

impl CommandOptions {
    /// Capture both streams, run in `cwd`.
    pub fn captured(cwd: &Path) -> Self {
        Self {
            cwd: Some(cwd.to_path_buf()),
            capture_stdout: true,
            capture_stderr: true,
            ..Default::default()
        }
    }

    /// Set the timeout in seconds.
    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        self.timeout = seconds;
        self
    }
}

/// Output line from command execution.
#[derive(Debug, Clone)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Callback for streaming output.
pub type OutputCallback = Box<dyn Fn(OutputLine) + Send>;

/// Something that can run shell commands.
///
/// The pipeline only talks to external tools through this trait.
pub trait CommandRunner: Send + Sync {
    /// Run `command` and report how it exited.
    fn run(&self, command: &str, options: &CommandOptions) -> Result<CommandResult>;
}

/// Runs commands through the user's shell.
#[derive(Default)]
pub struct ShellRunner {
    live_output: Option<std::sync::Arc<dyn Fn(OutputLine) + Send + Sync>>,
}

impl ShellRunner {
    /// Runner that only captures output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward every output line to `sink` while the command runs.
    pub fn with_live_output(sink: impl Fn(OutputLine) + Send + Sync + 'static) -> Self {
        Self {
            live_output: Some(std::sync::Arc::new(sink)),
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, options: &CommandOptions) -> Result<CommandResult> {
        tracing::debug!(command, "executing");
        match &self.live_output {
            Some(sink) => {
                let sink = std::sync::Arc::clone(sink);
                execute_streaming(command, options, Box::new(move |line| sink(line)))
            }
            None => execute(command, options),
        }
    }
}

fn build_command(command: &str, options: &CommandOptions) -> Command {
    let shell = detect_shell();
    let shell_flag = shell_flag(&shell);

    let mut cmd = Command::new(&shell);
    cmd.arg(shell_flag);
    cmd.arg(command);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd
}

/// Execute a shell command.
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    let start = Instant::now();
    let mut cmd = build_command(command, options);

    if options.capture_stdout {
        cmd.stdout(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit());
    }

    if options.capture_stderr {
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    let mut child = cmd.spawn().map_err(|_| PromoteError::CommandFailed {
        command: command.to_string(),
        code: None,
    })?;

    let stdout_handle = child.stdout.take().map(|s| thread::spawn(move || drain(s)));
    let stderr_handle = child.stderr.take().map(|s| thread::spawn(move || drain(s)));

    let status = wait_with_timeout(&mut child, command, options.timeout)?;

    let stdout = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    let duration = start.elapsed();

    if status.success() {
        Ok(CommandResult::success(stdout, stderr, duration))
    } else {
        Ok(CommandResult::failure(status.code(), stdout, stderr, duration))
    }
}

/// Execute a command with streaming output.
pub fn execute_streaming(
    command: &str,
    options: &CommandOptions,
    callback: OutputCallback,
) -> Result<CommandResult> {
    let start = Instant::now();
    let mut cmd = build_command(command, options);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|_| PromoteError::CommandFailed {
        command: command.to_string(),
        code: None,
    })?;

    let (tx, rx) = mpsc::channel();
    let tx_stdout = tx.clone();
    let tx_stderr = tx;

    let stdout_handle = child.stdout.take().map(|stdout| {
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            let mut output = String::new();
            for line in reader.lines().map_while(std::result::Result::ok) {
                output.push_str(&line);
                output.push('\n');
                let _ = tx_stdout.send(OutputLine::Stdout(line));
            }
            output
        })
    });

    let stderr_handle = child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            let mut output = String::new();
            for line in reader.lines().map_while(std::result::Result::ok) {
                output.push_str(&line);
                output.push('\n');
                let _ = tx_stderr.send(OutputLine::Stderr(line));
            }
            output
        })
    });

    let forwarder = thread::spawn(move || {
        for line in rx {
            callback(line);
        }
    });

    let status = wait_with_timeout(&mut child, command, options.timeout);

    let stdout_output = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr_output = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let _ = forwarder.join();

    let status = status?;
    let duration = start.elapsed();

    if status.success() {
        Ok(CommandResult::success(
            stdout_output,
            stderr_output,
            duration,
        ))
    } else {
        Ok(CommandResult::failure(
            status.code(),
            stdout_output,
            stderr_output,
            duration,
        ))
    }
}

/// Execute a command and collect output without streaming.
pub fn execute_quiet(command: &str, cwd: Option<&Path>) -> Result<CommandResult> {
    let options = CommandOptions {
        cwd: cwd.map(|p| p.to_path_buf()),
        capture_stdout: true,
        capture_stderr: true,
        ..Default::default()
    };
    execute(command, &options)
}

fn drain(mut stream: impl Read) -> String {
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).to_string()
}

fn wait_with_timeout(
    child: &mut Child,
    command: &str,
    timeout: Option<u64>,
) -> Result<std::process::ExitStatus> {
    let wait_err = |_| PromoteError::CommandFailed {
        command: command.to_string(),
        code: None,
    };

    let Some(seconds) = timeout else {
        return child.wait().map_err(wait_err);
    };

    let deadline = Instant::now() + Duration::from_secs(seconds);
    loop {
        if let Some(status) = child.try_wait().map_err(wait_err)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(PromoteError::CommandTimedOut {
                command: command.to_string(),
                seconds,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Detect the current shell.
fn detect_shell() -> String {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}

/// Get the flag to pass commands to the shell.
///
/// Uses `-lic` (interactive login shell) on Unix so that version managers
/// activated in the user's rc files put `sf`, `node` and `npm` on PATH.
///
/// In CI environments, uses `-lc` (login, non-interactive) to avoid
/// `bash: cannot set terminal process group` errors caused by `-i`
/// trying to set up job control without a TTY.
fn shell_flag(_shell: &str) -> &'static str {
    if cfg!(target_os = "windows") {
        "/C"
    } else if super::is_ci() {
        "-lc"
    } else {
        "-lic"
    }
}
