//! External command execution

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use gitdeb_core::error::{Error, Result};
use tracing::debug;

/// A command line to run, with an explicit working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), current_dir: None }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// True if `args` starts with `prefix`
    pub fn has_args(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code; signals are reported as 128 + signal number
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs external commands for the pipeline
pub trait ToolRunner: Send + Sync {
    /// Run to completion, capturing stdout and stderr
    fn output(&self, command: &ToolCommand) -> Result<ToolOutput>;

    /// Run to completion with inherited stdio, returning the exit code
    fn status(&self, command: &ToolCommand) -> Result<i32>;
}

/// [`ToolRunner`] that spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn output(&self, command: &ToolCommand) -> Result<ToolOutput> {
        debug!("Running: {}", command);
        let output = command
            .to_command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(command, e))?;

        Ok(ToolOutput {
            exit_code: exit_code(output.status),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn status(&self, command: &ToolCommand) -> Result<i32> {
        debug!("Running: {}", command);
        let status = command
            .to_command()
            .status()
            .map_err(|e| spawn_error(command, e))?;
        Ok(exit_code(status))
    }
}

fn spawn_error(command: &ToolCommand, e: std::io::Error) -> Error {
    Error::ToolNotFound { tool: command.program.clone(), reason: e.to_string() }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
