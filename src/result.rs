// ABOUTME: Stage and pipeline result envelopes shared by build and deploy.
// ABOUTME: Failures are carried as data (StageError) instead of being raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Auxiliary key/value facts attached to stages, errors, and aggregates.
pub type Context = BTreeMap<String, serde_json::Value>;

/// Fixed, flat failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Bad input detected before any external call.
    #[serde(rename = "validation_error")]
    Validation,
    /// Template or build-spec generation failed.
    #[serde(rename = "generation_error")]
    Generation,
    #[serde(rename = "build_error")]
    Build,
    #[serde(rename = "directory_error")]
    Directory,
    /// Cluster could not be reached.
    #[serde(rename = "cluster_error")]
    Cluster,
    #[serde(rename = "auth_error")]
    Auth,
    /// Deadline exceeded or the caller cancelled.
    #[serde(rename = "timeout_error")]
    Timeout,
    /// Generic external-tool failure not matching a more specific category.
    #[serde(rename = "kubectl_error")]
    Kubectl,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation_error",
            ErrorCategory::Generation => "generation_error",
            ErrorCategory::Build => "build_error",
            ErrorCategory::Directory => "directory_error",
            ErrorCategory::Cluster => "cluster_error",
            ErrorCategory::Auth => "auth_error",
            ErrorCategory::Timeout => "timeout_error",
            ErrorCategory::Kubectl => "kubectl_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorized stage failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{category}: {message}")]
pub struct StageError {
    pub category: ErrorCategory,
    pub message: String,
    /// Manifest path or image reference the failure concerns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Compact diagnostic excerpt (filtered events, describe highlights, tool output).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: Context,
}

impl StageError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            target: None,
            diagnostics: String::new(),
            context: Context::new(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Name of a discrete step inside a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Template,
    Validate,
    Build,
    Push,
    Apply,
    Delete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Template => "template",
            Stage::Validate => "validate",
            Stage::Build => "build",
            Stage::Push => "push",
            Stage::Apply => "apply",
            Stage::Delete => "delete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one executed stage.
///
/// `success == false` always carries an error and `success == true` never does;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    stage: Stage,
    success: bool,
    /// Whether a failure here halts the pipeline.
    required: bool,
    output: String,
    #[serde(with = "duration_secs")]
    duration: Duration,
    context: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<StageError>,
}

impl StageResult {
    pub fn succeeded(stage: Stage, output: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage,
            success: true,
            required: true,
            output: output.into(),
            duration,
            context: Context::new(),
            error: None,
        }
    }

    pub fn failed(
        stage: Stage,
        error: StageError,
        output: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            stage,
            success: false,
            required: true,
            output: output.into(),
            duration,
            context: Context::new(),
            error: Some(error),
        }
    }

    /// Mark this stage as advisory: its failure is recorded but never halts the pipeline.
    pub fn advisory(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn insert_context(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.context.insert(key.to_string(), value.into());
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn error(&self) -> Option<&StageError> {
        self.error.as_ref()
    }

    /// True when this stage failed and the pipeline must stop.
    pub fn is_terminal(&self) -> bool {
        !self.success && self.required
    }
}

/// Aggregate of one pipeline invocation.
///
/// `A` carries pipeline-specific artifacts (built image, deployed resources).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult<A> {
    pub success: bool,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub stages: Vec<StageResult>,
    /// Stage contexts merged under `<stage>.<key>`.
    pub context: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
    pub artifacts: A,
}

impl<A> PipelineResult<A> {
    /// First recorded result for `stage`.
    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage() == stage)
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.stage(stage).is_some()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.stage().as_str()).collect()
    }
}

/// Accumulates stage results for a single invocation and produces the aggregate.
pub(crate) struct PipelineRecorder {
    started_at: DateTime<Utc>,
    clock: std::time::Instant,
    stages: Vec<StageResult>,
    context: Context,
    failure: Option<(Stage, StageError)>,
}

impl PipelineRecorder {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Utc::now(),
            clock: std::time::Instant::now(),
            stages: Vec::new(),
            context: Context::new(),
            failure: None,
        }
    }

    /// Record a stage. Returns `false` when the pipeline must stop.
    pub(crate) fn record(&mut self, result: StageResult) -> bool {
        let stage = result.stage();
        for (key, value) in result.context() {
            self.context
                .insert(format!("{}.{}", stage, key), value.clone());
        }

        let terminal = result.is_terminal();
        if terminal
            && self.failure.is_none()
            && let Some(error) = result.error()
        {
            self.failure = Some((stage, error.clone()));
        }

        self.stages.push(result);
        !terminal
    }

    /// Add a pipeline-level context fact (not tied to a stage).
    pub(crate) fn note(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.context.insert(key.to_string(), value.into());
    }

    pub(crate) fn finish<A>(self, artifacts: A) -> PipelineResult<A> {
        let (failed_stage, error) = match self.failure {
            Some((stage, error)) => (Some(stage), Some(error)),
            None => (None, None),
        };

        PipelineResult {
            success: failed_stage.is_none() && !self.stages.is_empty(),
            started_at: self.started_at,
            duration: self.clock.elapsed(),
            stages: self.stages,
            context: self.context,
            failed_stage,
            error,
            artifacts,
        }
    }
}

pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_match_serialized_form() {
        for category in [
            ErrorCategory::Validation,
            ErrorCategory::Generation,
            ErrorCategory::Build,
            ErrorCategory::Directory,
            ErrorCategory::Cluster,
            ErrorCategory::Auth,
            ErrorCategory::Timeout,
            ErrorCategory::Kubectl,
        ] {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, serde_json::Value::String(category.as_str().into()));
        }
    }

    #[test]
    fn failed_stage_always_has_error() {
        let failed = StageResult::failed(
            Stage::Build,
            StageError::new(ErrorCategory::Build, "exit status 1"),
            "",
            Duration::ZERO,
        );
        assert!(!failed.success());
        assert!(failed.error().is_some());

        let ok = StageResult::succeeded(Stage::Build, "done", Duration::ZERO);
        assert!(ok.success());
        assert!(ok.error().is_none());
    }

    #[test]
    fn recorder_prefixes_context_and_attributes_failure() {
        let mut recorder = PipelineRecorder::start();
        assert!(recorder.record(
            StageResult::succeeded(Stage::Template, "", Duration::ZERO)
                .with_context("name", "dockerfile-go")
        ));
        assert!(!recorder.record(StageResult::failed(
            Stage::Build,
            StageError::new(ErrorCategory::Build, "boom"),
            "",
            Duration::ZERO,
        )));

        let result = recorder.finish(());
        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(Stage::Build));
        assert_eq!(result.error.unwrap().category, ErrorCategory::Build);
        assert_eq!(
            result.context.get("template.name"),
            Some(&serde_json::Value::from("dockerfile-go"))
        );
    }

    #[test]
    fn advisory_failure_does_not_stop_pipeline() {
        let mut recorder = PipelineRecorder::start();
        let lint = StageResult::failed(
            Stage::Validate,
            StageError::new(ErrorCategory::Validation, "lint"),
            "",
            Duration::ZERO,
        )
        .advisory();
        assert!(recorder.record(lint));

        let result = recorder.finish(());
        assert!(result.success);
        assert!(result.error.is_none());
    }
}
