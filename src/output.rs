// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Renders pipeline aggregates in normal, quiet (CI), and JSON modes.

use serde::Serialize;
use std::time::Instant;

use crate::result::{PipelineResult, StageResult};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputMode {
    /// Human-friendly output with a line per stage
    #[default]
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// One JSON document per result, for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn timed(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.timed() {
                Some(elapsed) => println!("{message} ({elapsed:.1}s)"),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.event("success", message, false),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => self.event("error", message, true),
        }
    }

    fn event(&self, event: &str, message: &str, to_stderr: bool) {
        let event = JsonEvent {
            event,
            message,
            duration_secs: self.timed(),
        };
        if let Ok(json) = serde_json::to_string(&event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }

    /// Print any serializable value as pretty JSON (json mode only).
    pub fn json<T: Serialize>(&self, value: &T) {
        if self.mode != OutputMode::Json {
            return;
        }
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "could not serialize result"),
        }
    }

    /// Render a pipeline aggregate. `what` names the pipeline ("build", "deployment").
    pub fn report<A: Serialize>(&self, what: &str, result: &PipelineResult<A>) {
        if self.mode == OutputMode::Json {
            self.json(result);
            return;
        }

        if self.mode == OutputMode::Normal {
            for stage in &result.stages {
                println!("{}", stage_line(stage));
            }
        }

        if result.success {
            println!("{what} succeeded ({:.1}s)", result.duration.as_secs_f64());
            return;
        }

        match (&result.failed_stage, &result.error) {
            (Some(stage), Some(error)) => {
                eprintln!("Error: {what} failed at {stage}: {error}");
                if self.mode == OutputMode::Normal && !error.diagnostics.is_empty() {
                    eprintln!("\n{}", error.diagnostics);
                }
            }
            _ => eprintln!("Error: {what} failed"),
        }
    }
}

/// `  ✓ build (12.3s)` or `  ✗ push (0.4s): timeout_error: ...`.
/// Advisory failures are marked `!`.
fn stage_line(stage: &StageResult) -> String {
    let secs = stage.duration().as_secs_f64();
    match stage.error() {
        None => format!("  ✓ {} ({secs:.1}s)", stage.stage()),
        Some(error) => {
            let mark = if stage.required() { '✗' } else { '!' };
            format!("  {mark} {} ({secs:.1}s): {error}", stage.stage())
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ErrorCategory, Stage, StageError};
    use std::time::Duration;

    #[test]
    fn successful_stage_line() {
        let stage = StageResult::succeeded(Stage::Build, "", Duration::from_millis(1500));
        assert_eq!(stage_line(&stage), "  ✓ build (1.5s)");
    }

    #[test]
    fn failed_stage_line_carries_category() {
        let error = StageError::new(ErrorCategory::Timeout, "push timed out");
        let stage = StageResult::failed(Stage::Push, error, "", Duration::ZERO);
        assert_eq!(stage_line(&stage), "  ✗ push (0.0s): timeout_error: push timed out");
    }

    #[test]
    fn advisory_failure_is_marked_differently() {
        let error = StageError::new(ErrorCategory::Validation, "2 lint errors");
        let stage = StageResult::failed(Stage::Validate, error, "", Duration::ZERO).advisory();
        assert!(stage_line(&stage).starts_with("  ! validate"));
    }
}
