// ABOUTME: CommandRunner trait and the tokio::process implementation.
// ABOUTME: Expiry of the ExecContext kills the child process and returns promptly.

use async_trait::async_trait;
use snafu::ResultExt;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::Instant;

use super::context::ExecContext;
use super::error::{ExecError, SpawnSnafu};

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
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

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// True when `program args...` begins with `prefix`.
    pub fn starts_with(&self, prefix: &[&str]) -> bool {
        let mut tokens =
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        prefix.iter().all(|p| tokens.next() == Some(*p))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, the way a terminal would show them.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }

    /// Short description of the exit status for error messages.
    pub fn status_text(&self) -> String {
        match self.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// The only seam between this engine and the outside world.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion unless `ctx` expires first.
    ///
    /// A nonzero exit is returned as `Ok`; callers interpret exit codes.
    async fn run(&self, ctx: &ExecContext, command: &CommandSpec)
    -> Result<CommandOutput, ExecError>;
}

/// Runs commands as local child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        ctx: &ExecContext,
        command: &CommandSpec,
    ) -> Result<CommandOutput, ExecError> {
        let program = command.program.clone();
        if let Some(expiry) = ctx.expiry() {
            return Err(ExecError::from_expiry(expiry, program, std::time::Duration::ZERO));
        }

        tracing::debug!(command = %command, "executing");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = command.cwd {
            cmd.current_dir(dir);
        }

        let started = Instant::now();
        let child = cmd.spawn().context(SpawnSnafu {
            program: program.clone(),
        })?;

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.context(SpawnSnafu { program })?;
                Ok(CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            expiry = ctx.expired() => {
                tracing::warn!(command = %command, ?expiry, "terminating external command");
                Err(ExecError::from_expiry(expiry, program, started.elapsed()))
            }
        }
    }
}
