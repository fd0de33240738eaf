// ABOUTME: Scripted CommandRunner that replays canned replies and records calls.
// ABOUTME: Lets callers exercise whole pipelines without docker or kubectl installed.

use async_trait::async_trait;
use parking_lot::Mutex;
use snafu::IntoError;
use std::collections::VecDeque;
use std::time::Duration;

use super::context::ExecContext;
use super::error::{ExecError, SpawnSnafu};
use super::runner::{CommandOutput, CommandRunner, CommandSpec};

/// What a scripted command does when invoked.
#[derive(Debug, Clone)]
pub struct Reply {
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
    delay: Duration,
    missing: bool,
}

impl Reply {
    /// Exit 0 with `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            delay: Duration::ZERO,
            missing: false,
        }
    }

    /// Nonzero exit with `stderr`.
    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
            delay: Duration::ZERO,
            missing: false,
        }
    }

    /// The executable cannot be started.
    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Self::ok("")
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Simulate a slow command; the context may expire while waiting.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

struct Rule {
    prefix: Vec<String>,
    replies: VecDeque<Reply>,
}

/// A [`CommandRunner`] driven by prefix-matched rules.
///
/// Rules are matched against `program args...`; the longest matching prefix
/// wins. Each rule replays its replies in order and repeats the last one.
/// Unmatched commands exit 127.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for commands starting with `prefix`.
    pub fn on(self, prefix: &[&str], reply: Reply) -> Self {
        {
            let mut rules = self.rules.lock();
            match rules.iter_mut().find(|r| r.prefix == prefix) {
                Some(rule) => rule.replies.push_back(reply),
                None => rules.push(Rule {
                    prefix: prefix.iter().map(|s| s.to_string()).collect(),
                    replies: VecDeque::from([reply]),
                }),
            }
        }
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }

    /// Number of recorded commands starting with `prefix`.
    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn next_reply(&self, command: &CommandSpec) -> Option<Reply> {
        let mut rules = self.rules.lock();
        let rule = rules
            .iter_mut()
            .filter(|r| {
                let prefix: Vec<&str> = r.prefix.iter().map(String::as_str).collect();
                command.starts_with(&prefix)
            })
            .max_by_key(|r| r.prefix.len())?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        ctx: &ExecContext,
        command: &CommandSpec,
    ) -> Result<CommandOutput, ExecError> {
        let program = command.program.clone();
        if let Some(expiry) = ctx.expiry() {
            return Err(ExecError::from_expiry(expiry, program, Duration::ZERO));
        }

        self.calls.lock().push(command.clone());

        let Some(reply) = self.next_reply(command) else {
            return Ok(CommandOutput {
                exit_code: Some(127),
                stdout: String::new(),
                stderr: format!("no scripted reply for: {command}"),
            });
        };

        if reply.missing {
            let source = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
            return Err(SpawnSnafu { program }.into_error(source));
        }

        if !reply.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(reply.delay) => {}
                expiry = ctx.expired() => return Err(ExecError::from_expiry(expiry, program, reply.delay)),
            }
        }

        Ok(CommandOutput {
            exit_code: reply.exit_code,
            stdout: reply.stdout,
            stderr: reply.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_queue_then_repeats_last() {
        let runner = ScriptedRunner::new()
            .on(&["docker", "push"], Reply::fail(1, "reset"))
            .on(&["docker", "push"], Reply::ok("pushed"));
        let ctx = ExecContext::new();
        let push = CommandSpec::new("docker").args(["push", "app"]);

        assert!(!runner.run(&ctx, &push).await.unwrap().success());
        assert!(runner.run(&ctx, &push).await.unwrap().success());
        assert!(runner.run(&ctx, &push).await.unwrap().success());
        assert_eq!(runner.count(&["docker", "push"]), 3);
    }

    #[tokio::test]
    async fn unmatched_command_exits_127() {
        let runner = ScriptedRunner::new();
        let out = runner
            .run(&ExecContext::new(), &CommandSpec::new("kubectl").arg("version"))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(127));
    }
}
