// ABOUTME: Deployment service: apply, post-apply health validation, delete, and diff.
// ABOUTME: Failures come back as data; unhealthy validations carry a diagnostic excerpt.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::manifest::validate_manifest_file;
use super::parse::{DeployedResource, PodStatus, parse_apply_output, parse_pod_list};
use crate::config::{DEFAULT_NAMESPACE, DeployOptions, EngineConfig};
use crate::diagnostics::{categorize_error, extract_essential_pod_info, filter_relevant_events, tail};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec, ExecContext};
use crate::result::{
    ErrorCategory, PipelineRecorder, PipelineResult, Stage, StageError, StageResult, duration_secs,
};

const EXCERPT_LINES: usize = 30;
const CLUSTER_PROBE_NAMESPACE: &str = "kube-system";

/// Post-apply health of the pods in a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub namespace: String,
    pub pods_ready: usize,
    pub pods_total: usize,
    pub pods: Vec<PodStatus>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentArtifacts {
    pub manifest: PathBuf,
    pub namespace: String,
    pub resources: Vec<DeployedResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    pub dry_run: bool,
}

pub type DeploymentResult = PipelineResult<DeploymentArtifacts>;

pub struct DeploymentService {
    config: Arc<EngineConfig>,
    runner: Arc<dyn CommandRunner>,
}

/// `-n <ns>` unless the namespace is the cluster default.
fn namespace_flag(namespace: &str) -> Vec<String> {
    if namespace.is_empty() || namespace == DEFAULT_NAMESPACE {
        Vec::new()
    } else {
        vec!["-n".to_string(), namespace.to_string()]
    }
}

fn command_failure(action: &str, output: &CommandOutput, target: &Path) -> StageError {
    let combined = output.combined();
    StageError::new(
        categorize_error(&output.status_text(), &combined),
        format!("kubectl {action} failed: {}", output.status_text()),
    )
    .with_target(target.display().to_string())
    .with_diagnostics(tail(&combined, EXCERPT_LINES))
}

impl DeploymentService {
    pub fn new(config: Arc<EngineConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    fn kubectl(&self) -> CommandSpec {
        CommandSpec::new(&self.config.tools.kubectl)
    }

    /// Apply `manifest`, then optionally validate pod health.
    ///
    /// When validation runs, its outcome decides overall success; a healthy
    /// apply followed by unhealthy pods yields a failed `validate` stage.
    pub async fn deploy_manifest(&self, ctx: &ExecContext, manifest: &Path, options: &DeployOptions) -> DeploymentResult {
        let mut recorder = PipelineRecorder::start();
        let namespace = self.config.namespace_or_default(&options.namespace).to_string();
        let mut artifacts = DeploymentArtifacts {
            manifest: manifest.to_path_buf(),
            namespace: namespace.clone(),
            dry_run: options.dry_run,
            ..DeploymentArtifacts::default()
        };
        let started = Instant::now();
        recorder.note("manifest", manifest.display().to_string());

        tracing::info!(
            stage = "apply",
            manifest = %manifest.display(),
            namespace = %namespace,
            dry_run = options.dry_run,
            "applying manifest"
        );

        if let Err(error) = validate_manifest_file(manifest) {
            tracing::error!(stage = "apply", manifest = %manifest.display(), error = %error, "manifest rejected");
            recorder.record(StageResult::failed(Stage::Apply, error, "", started.elapsed()));
            return finish("deployment", recorder, artifacts);
        }

        let mut command = self
            .kubectl()
            .args(["apply", "-f"])
            .arg(manifest.display().to_string())
            .args(namespace_flag(&namespace));
        if options.dry_run {
            command = command.arg("--dry-run=server");
        }
        if options.force {
            command = command.arg("--force");
        }
        if options.wait {
            command = command.arg("--wait=true");
        }

        let apply_ctx = ctx.with_timeout(options.wait_timeout);
        let stage = match self.runner.run(&apply_ctx, &command).await {
            Err(e) => {
                tracing::error!(stage = "apply", error = %e, "apply did not complete");
                let error = e
                    .into_stage_error(ErrorCategory::Kubectl)
                    .with_target(manifest.display().to_string());
                StageResult::failed(Stage::Apply, error, "", started.elapsed())
            }
            Ok(output) if !output.success() => {
                let error = command_failure("apply", &output, manifest);
                tracing::error!(stage = "apply", category = %error.category, "apply failed");
                StageResult::failed(Stage::Apply, error, output.combined(), started.elapsed())
            }
            Ok(output) => {
                artifacts.resources = parse_apply_output(&output.stdout);
                let duration = started.elapsed();
                tracing::info!(
                    stage = "apply",
                    resources = artifacts.resources.len(),
                    duration_ms = duration.as_millis() as u64,
                    "manifest applied"
                );
                StageResult::succeeded(Stage::Apply, output.combined(), duration)
                    .with_context("resource_count", artifacts.resources.len())
                    .with_context("namespace", namespace.as_str())
                    .with_context("dry_run", options.dry_run)
            }
        };
        if !recorder.record(stage) {
            return finish("deployment", recorder, artifacts);
        }

        if options.validate {
            let validation = self
                .validate_deployment(ctx, manifest, &namespace, options.selector.as_deref())
                .await;
            let stage = validation_stage(&validation);
            artifacts.validation = Some(validation);
            recorder.record(stage);
        }

        finish("deployment", recorder, artifacts)
    }

    /// Check pod readiness in `namespace`; on failure, gather events and
    /// per-pod describe excerpts before returning.
    pub async fn validate_deployment(
        &self,
        ctx: &ExecContext,
        manifest: &Path,
        namespace: &str,
        selector: Option<&str>,
    ) -> ValidationResult {
        let started = Instant::now();
        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            namespace
        };

        let mut command = self.kubectl().args(["get", "pods", "-n", namespace]);
        if let Some(selector) = selector.filter(|s| !s.is_empty()) {
            command = command.args(["-l", selector]);
        }
        command = command.args(["-o", "wide"]);

        let listing = match self.runner.run(ctx, &command).await {
            Ok(output) if output.success() => output.stdout,
            Ok(output) => {
                let mut error = command_failure("get pods", &output, manifest);
                error.message = format!("failed to get pod status: {}", output.status_text());
                return unhealthy(namespace, Vec::new(), 0, error, started);
            }
            Err(e) => {
                let error = e
                    .into_stage_error(ErrorCategory::Kubectl)
                    .with_target(manifest.display().to_string());
                return unhealthy(namespace, Vec::new(), 0, error, started);
            }
        };

        let pods = parse_pod_list(&listing);
        let pods_total = pods.len();
        let pods_ready = pods.iter().filter(|p| p.is_ready()).count();

        if pods_total > 0 && pods_ready == pods_total {
            tracing::info!(stage = "validate", namespace, pods_ready, pods_total, "all pods ready");
            return ValidationResult {
                success: true,
                namespace: namespace.to_string(),
                pods_ready,
                pods_total,
                pods,
                duration: started.elapsed(),
                error: None,
            };
        }

        tracing::warn!(stage = "validate", namespace, pods_ready, pods_total, "pods not ready; gathering diagnostics");
        let (diagnostics, events_found, pods_described) = self.gather_diagnostics(ctx, namespace, &pods).await;

        let error = StageError::new(
            ErrorCategory::Validation,
            format!("Deployment validation failed: {pods_ready}/{pods_total} pods ready"),
        )
        .with_target(manifest.display().to_string())
        .with_diagnostics(diagnostics)
        .with_context("pods_ready", pods_ready)
        .with_context("pods_total", pods_total)
        .with_context("events_found", events_found)
        .with_context("pods_described", pods_described);

        unhealthy(namespace, pods, pods_ready, error, started)
    }

    /// Events first, then describe excerpts for each pod that is not ready.
    /// Diagnostic commands that fail are skipped.
    async fn gather_diagnostics(&self, ctx: &ExecContext, namespace: &str, pods: &[PodStatus]) -> (String, bool, usize) {
        let mut sections = Vec::new();
        let mut events_found = false;
        let mut described = 0;

        let events = self.kubectl().args(["get", "events", "-n", namespace]);
        match self.runner.run(ctx, &events).await {
            Ok(output) if output.success() => {
                let filtered = filter_relevant_events(&output.stdout);
                if !filtered.is_empty() {
                    events_found = true;
                    sections.push("Critical Events:".to_string());
                    sections.push(filtered);
                }
            }
            Ok(output) => tracing::warn!(namespace, status = %output.status_text(), "could not list events"),
            Err(e) => tracing::warn!(namespace, error = %e, "could not list events"),
        }

        for pod in pods.iter().filter(|p| !p.is_ready()) {
            let describe = self.kubectl().args(["describe", "pod", pod.name.as_str(), "-n", namespace]);
            match self.runner.run(ctx, &describe).await {
                Ok(output) if output.success() => {
                    let essential = extract_essential_pod_info(&output.stdout, &pod.name);
                    if !essential.is_empty() {
                        described += 1;
                        sections.push(format!("\nPod Issues for {}:", pod.name));
                        sections.push(essential);
                    }
                }
                Ok(output) => tracing::warn!(pod = %pod.name, status = %output.status_text(), "could not describe pod"),
                Err(e) => tracing::warn!(pod = %pod.name, error = %e, "could not describe pod"),
            }
        }

        (sections.join("\n\n"), events_found, described)
    }

    /// Delete everything in `manifest`. Resources that are already gone are not an error.
    pub async fn delete_deployment(&self, ctx: &ExecContext, manifest: &Path, namespace: &str) -> DeploymentResult {
        let mut recorder = PipelineRecorder::start();
        let namespace = self.config.namespace_or_default(namespace).to_string();
        let artifacts = DeploymentArtifacts {
            manifest: manifest.to_path_buf(),
            namespace: namespace.clone(),
            ..DeploymentArtifacts::default()
        };
        let started = Instant::now();

        tracing::info!(stage = "delete", manifest = %manifest.display(), namespace = %namespace, "deleting manifest");

        if let Err(error) = validate_manifest_file(manifest) {
            recorder.record(StageResult::failed(Stage::Delete, error, "", started.elapsed()));
            return finish("deletion", recorder, artifacts);
        }

        let command = self
            .kubectl()
            .args(["delete", "-f"])
            .arg(manifest.display().to_string())
            .args(namespace_flag(&namespace))
            .arg("--ignore-not-found=true");

        let stage = match self.runner.run(ctx, &command).await {
            Err(e) => {
                let error = e
                    .into_stage_error(ErrorCategory::Kubectl)
                    .with_target(manifest.display().to_string());
                StageResult::failed(Stage::Delete, error, "", started.elapsed())
            }
            Ok(output) if output.success() || output.combined().to_lowercase().contains("not found") => {
                let deleted = output.stdout.lines().filter(|l| l.trim_end().ends_with("deleted")).count();
                StageResult::succeeded(Stage::Delete, output.combined(), started.elapsed())
                    .with_context("deleted", deleted)
                    .with_context("namespace", namespace.as_str())
            }
            Ok(output) => {
                let error = command_failure("delete", &output, manifest);
                tracing::error!(stage = "delete", category = %error.category, "delete failed");
                StageResult::failed(Stage::Delete, error, output.combined(), started.elapsed())
            }
        };
        recorder.record(stage);
        finish("deletion", recorder, artifacts)
    }

    /// Show what applying `manifest` would change.
    ///
    /// `kubectl diff` exits 1 when differences exist, so a nonzero exit with
    /// output is a successful preview. Only a nonzero exit with no output fails.
    pub async fn preview_changes(&self, ctx: &ExecContext, manifest: &Path, namespace: &str) -> Result<String, StageError> {
        validate_manifest_file(manifest)?;

        let command = self
            .kubectl()
            .args(["diff", "-f"])
            .arg(manifest.display().to_string())
            .args(namespace_flag(namespace));

        let output = self.runner.run(ctx, &command).await.map_err(|e| {
            e.into_stage_error(ErrorCategory::Kubectl)
                .with_target(manifest.display().to_string())
        })?;

        let combined = output.combined();
        if output.success() || !combined.trim().is_empty() {
            tracing::debug!(manifest = %manifest.display(), changed = !output.success(), "diff computed");
            return Ok(combined);
        }
        Err(command_failure("diff", &output, manifest))
    }

    /// Verify the cluster answers a cheap read.
    pub async fn check_cluster_connection(&self, ctx: &ExecContext) -> Result<(), StageError> {
        let command = self.kubectl().args(["get", "pods", "-n", CLUSTER_PROBE_NAMESPACE]);
        let output = self
            .runner
            .run(ctx, &command)
            .await
            .map_err(|e| e.into_stage_error(ErrorCategory::Cluster))?;
        if output.success() {
            return Ok(());
        }
        let combined = output.combined();
        Err(StageError::new(
            categorize_error(&output.status_text(), &combined),
            format!("cannot connect to cluster: {}", output.status_text()),
        )
        .with_diagnostics(tail(&combined, EXCERPT_LINES)))
    }
}

fn unhealthy(
    namespace: &str,
    pods: Vec<PodStatus>,
    pods_ready: usize,
    error: StageError,
    started: Instant,
) -> ValidationResult {
    ValidationResult {
        success: false,
        namespace: namespace.to_string(),
        pods_ready,
        pods_total: pods.len(),
        pods,
        duration: started.elapsed(),
        error: Some(error),
    }
}

fn validation_stage(validation: &ValidationResult) -> StageResult {
    let embedded = serde_json::to_value(validation).unwrap_or_default();
    let summary = format!("{}/{} pods ready", validation.pods_ready, validation.pods_total);
    let stage = if validation.success {
        StageResult::succeeded(Stage::Validate, summary, validation.duration)
    } else {
        let error = validation
            .error
            .clone()
            .unwrap_or_else(|| StageError::new(ErrorCategory::Validation, summary.clone()));
        StageResult::failed(Stage::Validate, error, summary, validation.duration)
    };
    stage
        .with_context("validation", embedded)
        .with_context("pods_ready", validation.pods_ready)
        .with_context("pods_total", validation.pods_total)
}

fn finish(what: &str, recorder: PipelineRecorder, artifacts: DeploymentArtifacts) -> DeploymentResult {
    let result = recorder.finish(artifacts);
    let duration_ms = result.duration.as_millis() as u64;
    match result.failed_stage {
        None => tracing::info!(what, success = result.success, duration_ms, "finished"),
        Some(stage) => tracing::error!(what, %stage, duration_ms, "stopped"),
    }
    result
}
