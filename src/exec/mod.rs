// ABOUTME: External command execution seam for docker and kubectl.
// ABOUTME: Exposes the runner trait, a process-backed runner, and a scripted runner.

mod context;
mod error;
mod runner;
mod scripted;

pub use context::{ExecContext, Expiry};
pub use error::{ExecError, ExecErrorKind};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use scripted::{Reply, ScriptedRunner};
