// ABOUTME: Command execution error types with SNAFU pattern.
// ABOUTME: A nonzero exit is not an error here; only spawn failures and expiry are.

use snafu::Snafu;
use std::time::Duration;

use super::context::Expiry;
use crate::result::{ErrorCategory, StageError};

/// Failure to obtain any exit status from an external command.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExecError {
    #[snafu(display("failed to start {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("{program} was cancelled"))]
    Cancelled { program: String },

    #[snafu(display("{program} timed out after {elapsed:?}"))]
    TimedOut { program: String, elapsed: Duration },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecErrorKind {
    /// Executable missing or not runnable.
    Spawn,
    Cancelled,
    TimedOut,
}

impl ExecError {
    /// The error for a context that stopped while `program` was pending.
    pub fn from_expiry(expiry: Expiry, program: impl Into<String>, elapsed: Duration) -> Self {
        let program = program.into();
        match expiry {
            Expiry::Cancelled => CancelledSnafu { program }.build(),
            Expiry::DeadlineExceeded => TimedOutSnafu { program, elapsed }.build(),
        }
    }

    pub fn kind(&self) -> ExecErrorKind {
        match self {
            ExecError::Spawn { .. } => ExecErrorKind::Spawn,
            ExecError::Cancelled { .. } => ExecErrorKind::Cancelled,
            ExecError::TimedOut { .. } => ExecErrorKind::TimedOut,
        }
    }

    /// Convert into a stage error. Expiry always maps to `timeout_error`;
    /// spawn failures take the caller's category.
    pub fn into_stage_error(self, spawn_category: ErrorCategory) -> StageError {
        let category = match self.kind() {
            ExecErrorKind::Spawn => spawn_category,
            ExecErrorKind::Cancelled | ExecErrorKind::TimedOut => ErrorCategory::Timeout,
        };
        let mut error = StageError::new(category, self.to_string());
        if let ExecError::Cancelled { .. } = self {
            error = error.with_context("cancelled", true);
        }
        error
    }
}
