// ABOUTME: Build pipeline: template selection, Dockerfile lint, image build and push.
// ABOUTME: Drives docker through the CommandRunner seam.

pub mod image;
pub mod lint;
mod pipeline;
pub mod templates;

pub use lint::{LintIssue, LintReport, Severity, validate_build_spec};
pub use pipeline::{
    BuildArtifacts, BuildPipeline, BuildResult, BuiltImage, ContainerizationResult, ContainerizeRequest,
    PushResult,
};
pub use templates::{
    GenerationResult, Template, TemplateHints, TemplateSelection, catalogue, find_template,
    generate_from_template, map_template_name, select_template,
};
