// ABOUTME: Build pipeline driver: template, lint, build, and optional push.
// ABOUTME: Required stage failures end the run; lint failures are recorded and skipped past.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::image::{
    BuildSummary, build_command, parse_build_output, parse_push_digest, push_command, tag_command,
};
use super::lint::{LintReport, validate_build_spec};
use super::templates::{DOCKERFILE, GenerationResult, TemplateHints, generate_from_template, select_template};
use crate::config::{BuildOptions, EngineConfig, PushOptions, StageOptions};
use crate::diagnostics::{categorize_with_fallback, tail};
use crate::exec::{CommandRunner, ExecContext, ExecError, ExecErrorKind};
use crate::result::{ErrorCategory, PipelineRecorder, PipelineResult, Stage, StageError, StageResult};
use crate::types::ImageRef;

/// Lines of tool output kept in a failure's diagnostic excerpt.
const EXCERPT_LINES: usize = 30;

/// Input to one containerization run.
#[derive(Debug, Clone)]
pub struct ContainerizeRequest {
    pub target_dir: PathBuf,
    /// Explicit template name; selected from `hints` when absent.
    pub template: Option<String>,
    pub hints: TemplateHints,
    pub build: BuildOptions,
    pub push: PushOptions,
    pub auto_push: bool,
    pub lint: bool,
}

impl ContainerizeRequest {
    pub fn new(target_dir: impl Into<PathBuf>, defaults: &StageOptions) -> Self {
        Self {
            target_dir: target_dir.into(),
            template: None,
            hints: TemplateHints::default(),
            build: defaults.build.clone(),
            push: defaults.push.clone(),
            auto_push: false,
            lint: true,
        }
    }
}

/// Typed facts gathered along the way; mirrors what the stage contexts report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildArtifacts {
    pub template: Option<String>,
    pub dockerfile: Option<PathBuf>,
    pub lint: Option<LintReport>,
    pub image: Option<String>,
    pub image_id: Option<String>,
    pub layers: usize,
    pub pushed: Option<String>,
    pub digest: Option<String>,
}

pub type ContainerizationResult = PipelineResult<BuildArtifacts>;

/// A successfully built local image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltImage {
    pub image: ImageRef,
    pub summary: BuildSummary,
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    pub stage: StageResult,
    pub built: Option<BuiltImage>,
}

#[derive(Debug, Clone)]
pub struct PushResult {
    pub stage: StageResult,
    pub digest: Option<String>,
    pub attempts: u32,
}

pub struct BuildPipeline {
    config: Arc<EngineConfig>,
    runner: Arc<dyn CommandRunner>,
}

impl BuildPipeline {
    pub fn new(config: Arc<EngineConfig>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// Run `Template -> Validate -> Build -> Push` for one target directory.
    pub async fn containerize(&self, ctx: &ExecContext, request: &ContainerizeRequest) -> ContainerizationResult {
        let mut recorder = PipelineRecorder::start();
        let mut artifacts = BuildArtifacts::default();
        recorder.note("target_dir", request.target_dir.display().to_string());

        tracing::info!(dir = %request.target_dir.display(), "containerizing");

        let generated = match template_stage(request) {
            Ok((stage, generated)) => {
                artifacts.template = Some(generated.template.clone());
                artifacts.dockerfile = Some(generated.path.clone());
                recorder.record(stage);
                generated
            }
            Err(stage) => {
                recorder.record(stage);
                return finish(recorder, artifacts);
            }
        };

        if request.lint {
            let (stage, report) = lint_stage(&generated.dockerfile);
            artifacts.lint = Some(report);
            recorder.record(stage);
        }

        let build = self.build_image(ctx, &request.target_dir, &request.build).await;
        if let Some(ref built) = build.built {
            artifacts.image = Some(built.image.to_string());
            artifacts.image_id = built.summary.image_id.clone();
            artifacts.layers = built.summary.layers;
        }
        if !recorder.record(build.stage) {
            return finish(recorder, artifacts);
        }
        let Some(built) = build.built else {
            return finish(recorder, artifacts);
        };

        let registry = request.build.registry.trim();
        if request.auto_push && !registry.is_empty() {
            let target = built.image.qualified(registry);
            let push = self.publish(ctx, &built.image, &target, &request.push).await;
            if push.stage.success() {
                artifacts.pushed = Some(target.to_string());
                artifacts.digest = push.digest;
            }
            recorder.record(push.stage);
        }

        finish(recorder, artifacts)
    }

    /// Build `target_dir/Dockerfile` into the image named by `options`.
    pub async fn build_image(&self, ctx: &ExecContext, target_dir: &Path, options: &BuildOptions) -> BuildResult {
        let started = Instant::now();

        let image = match ImageRef::parse(&options.image_name) {
            Ok(image) => image,
            Err(e) => {
                let error = StageError::new(
                    ErrorCategory::Validation,
                    format!("invalid image name {:?}: {e}", options.image_name),
                )
                .with_target(options.image_name.clone());
                return BuildResult {
                    stage: StageResult::failed(Stage::Build, error, "", started.elapsed()),
                    built: None,
                };
            }
        };

        let dockerfile = target_dir.join(DOCKERFILE);
        let command = build_command(&self.config.tools.docker, target_dir, &dockerfile, &image, options);
        let build_ctx = ctx.with_timeout(options.timeout);

        tracing::info!(stage = "build", image = %image, "building image");

        let output = match self.runner.run(&build_ctx, &command).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(stage = "build", image = %image, error = %e, "build did not complete");
                let error = e.into_stage_error(ErrorCategory::Build).with_target(image.to_string());
                return BuildResult {
                    stage: StageResult::failed(Stage::Build, error, "", started.elapsed()),
                    built: None,
                };
            }
        };

        let combined = output.combined();
        if !output.success() {
            tracing::error!(stage = "build", image = %image, status = %output.status_text(), "build failed");
            let error = StageError::new(
                ErrorCategory::Build,
                format!("docker build failed: {}", output.status_text()),
            )
            .with_target(image.to_string())
            .with_diagnostics(tail(&combined, EXCERPT_LINES));
            return BuildResult {
                stage: StageResult::failed(Stage::Build, error, combined, started.elapsed()),
                built: None,
            };
        }

        let summary = parse_build_output(&combined);
        let duration = started.elapsed();
        tracing::info!(
            stage = "build",
            image = %image,
            layers = summary.layers,
            duration_ms = duration.as_millis() as u64,
            "image built"
        );

        let mut stage = StageResult::succeeded(Stage::Build, combined, duration)
            .with_context("image", image.to_string())
            .with_context("layers", summary.layers);
        if let Some(ref id) = summary.image_id {
            stage.insert_context("image_id", id.as_str());
        }

        BuildResult {
            stage,
            built: Some(BuiltImage { image, summary }),
        }
    }

    /// Tag `local` as `target` when they differ, then push `target`.
    pub async fn publish(
        &self,
        ctx: &ExecContext,
        local: &ImageRef,
        target: &ImageRef,
        options: &PushOptions,
    ) -> PushResult {
        if local != target {
            let started = Instant::now();
            let command = tag_command(&self.config.tools.docker, local, target);
            let failure = match self.runner.run(ctx, &command).await {
                Ok(output) if output.success() => None,
                Ok(output) => {
                    let combined = output.combined();
                    let category = categorize_with_fallback(&output.status_text(), &combined, ErrorCategory::Build);
                    Some((
                        StageError::new(category, format!("docker tag failed: {}", output.status_text()))
                            .with_diagnostics(tail(&combined, EXCERPT_LINES)),
                        combined,
                    ))
                }
                Err(e) => Some((e.into_stage_error(ErrorCategory::Build), String::new())),
            };
            if let Some((error, output)) = failure {
                tracing::error!(stage = "push", image = %target, "tagging failed");
                return PushResult {
                    stage: StageResult::failed(Stage::Push, error.with_target(target.to_string()), output, started.elapsed()),
                    digest: None,
                    attempts: 0,
                };
            }
        }

        self.push_image(ctx, target, options).await
    }

    /// Push with up to `retry_count` re-issues of the full command.
    ///
    /// Each attempt re-checks `ctx` first; a re-push after a partial upload is
    /// possible, so delivery is at-least-once.
    pub async fn push_image(&self, ctx: &ExecContext, image: &ImageRef, options: &PushOptions) -> PushResult {
        let started = Instant::now();
        let docker = &self.config.tools.docker;
        let command = push_command(docker, image);
        let attempts = options.retry_count.saturating_add(1);

        let mut failure = (
            StageError::new(ErrorCategory::Build, "push was not attempted"),
            String::new(),
        );
        let mut made = 0;

        for attempt in 1..=attempts {
            if let Some(expiry) = ctx.expiry() {
                failure.0 = ExecError::from_expiry(expiry, docker.as_str(), started.elapsed())
                    .into_stage_error(ErrorCategory::Build);
                break;
            }
            made = attempt;

            tracing::info!(stage = "push", image = %image, attempt, attempts, "pushing image");
            let attempt_ctx = ctx.with_timeout(options.timeout);
            match self.runner.run(&attempt_ctx, &command).await {
                Ok(output) if output.success() => {
                    let digest = parse_push_digest(&output.stdout);
                    let duration = started.elapsed();
                    tracing::info!(
                        stage = "push",
                        image = %image,
                        attempt,
                        duration_ms = duration.as_millis() as u64,
                        "image pushed"
                    );
                    let mut stage = StageResult::succeeded(Stage::Push, output.combined(), duration)
                        .with_context("image", image.to_string())
                        .with_context("attempts", attempt);
                    if let Some(ref digest) = digest {
                        stage.insert_context("digest", digest.as_str());
                    }
                    return PushResult {
                        stage,
                        digest,
                        attempts: attempt,
                    };
                }
                Ok(output) => {
                    let combined = output.combined();
                    let category = categorize_with_fallback(&output.status_text(), &combined, ErrorCategory::Build);
                    tracing::warn!(stage = "push", image = %image, attempt, attempts, %category, "push attempt failed");
                    failure = (
                        StageError::new(category, format!("docker push failed: {}", output.status_text()))
                            .with_diagnostics(tail(&combined, EXCERPT_LINES)),
                        combined,
                    );
                }
                Err(e) => {
                    // Only a per-attempt timeout is worth another try.
                    let retryable = e.kind() == ExecErrorKind::TimedOut;
                    tracing::warn!(stage = "push", image = %image, attempt, error = %e, "push attempt did not complete");
                    failure = (e.into_stage_error(ErrorCategory::Build), String::new());
                    if !retryable {
                        break;
                    }
                }
            }

            if attempt < attempts && !options.retry_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(options.retry_delay) => {}
                    _ = ctx.expired() => {}
                }
            }
        }

        let (error, output) = failure;
        tracing::error!(stage = "push", image = %image, attempts = made, "push failed");
        PushResult {
            stage: StageResult::failed(
                Stage::Push,
                error.with_target(image.to_string()),
                output,
                started.elapsed(),
            )
            .with_context("attempts", made),
            digest: None,
            attempts: made,
        }
    }
}

fn template_stage(request: &ContainerizeRequest) -> Result<(StageResult, GenerationResult), StageResult> {
    let started = Instant::now();

    let (name, selection) = match request.template.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => (name.to_string(), None),
        _ => {
            let selection = select_template(&request.hints);
            tracing::info!(
                stage = "template",
                template = %selection.template,
                score = selection.score,
                "template selected automatically"
            );
            (selection.template.clone(), Some(selection))
        }
    };

    let annotate = |mut stage: StageResult| {
        stage.insert_context("template_auto_selected", selection.is_some());
        if let Some(ref selection) = selection {
            stage.insert_context("suggestions", selection.suggestions.clone());
            stage.insert_context("reasoning", selection.reasoning.clone());
            stage.insert_context("score", selection.score);
        }
        stage
    };

    match generate_from_template(&name, &request.target_dir) {
        Ok(generated) => {
            let stage = StageResult::succeeded(
                Stage::Template,
                format!("generated {} from {}", generated.path.display(), generated.template),
                started.elapsed(),
            )
            .with_context("template", generated.template.as_str())
            .with_context("dockerfile", generated.path.display().to_string());
            Ok((annotate(stage), generated))
        }
        Err(error) => {
            tracing::error!(stage = "template", template = %name, category = %error.category, "template generation failed");
            let stage = StageResult::failed(Stage::Template, error, "", started.elapsed())
                .with_context("template", name.as_str());
            Err(annotate(stage))
        }
    }
}

fn lint_stage(dockerfile: &str) -> (StageResult, LintReport) {
    let started = Instant::now();
    let report = validate_build_spec(dockerfile);
    let errors = report.errors().count();
    let warnings = report.warnings().count();

    let stage = if report.valid {
        StageResult::succeeded(Stage::Validate, report.summary(), started.elapsed())
    } else {
        tracing::warn!(stage = "validate", errors, warnings, "Dockerfile lint reported errors; building anyway");
        let error = StageError::new(
            ErrorCategory::Validation,
            format!("Dockerfile lint found {errors} error(s)"),
        )
        .with_target(DOCKERFILE)
        .with_diagnostics(report.summary());
        StageResult::failed(Stage::Validate, error, report.summary(), started.elapsed())
    };

    let stage = stage
        .advisory()
        .with_context("valid", report.valid)
        .with_context("errors", errors)
        .with_context("warnings", warnings);
    (stage, report)
}

fn finish(recorder: PipelineRecorder, artifacts: BuildArtifacts) -> ContainerizationResult {
    let result = recorder.finish(artifacts);
    let duration_ms = result.duration.as_millis() as u64;
    match result.failed_stage {
        None => tracing::info!(success = result.success, duration_ms, "containerization finished"),
        Some(stage) => tracing::error!(%stage, duration_ms, "containerization stopped"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lint_failure_is_advisory() {
        let (stage, report) = lint_stage("RUN echo hi\n");
        assert!(!report.valid);
        assert!(!stage.success());
        assert!(!stage.is_terminal());
        assert_eq!(stage.context()["valid"], false);
        assert_eq!(stage.error().unwrap().category, ErrorCategory::Validation);
    }

    #[test]
    fn clean_dockerfile_counts_warnings() {
        let (stage, report) = lint_stage("FROM alpine\nCMD [\"sh\"]\n");
        assert!(report.valid);
        assert!(stage.success());
        assert_eq!(stage.context()["warnings"], 1);
    }

    #[test]
    fn explicit_template_is_not_auto_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = ContainerizeRequest::new(dir.path(), &StageOptions::default());
        request.template = Some("go".into());
        let (stage, generated) = template_stage(&request).unwrap();
        assert_eq!(generated.template, "dockerfile-go");
        assert_eq!(stage.context()["template_auto_selected"], false);
        assert!(!stage.context().contains_key("suggestions"));
    }
}
