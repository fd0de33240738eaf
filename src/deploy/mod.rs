// ABOUTME: Deployment service over kubectl: manifest checks, apply, health validation.
// ABOUTME: Also exposes the output parsers so they can be replaced by a typed client later.

mod manifest;
mod parse;
mod service;

pub use manifest::{REQUIRED_FIELDS, validate_manifest_file};
pub use parse::{DeployedResource, PodStatus, ResourceStatus, parse_apply_output, parse_pod_list};
pub use service::{DeploymentArtifacts, DeploymentResult, DeploymentService, ValidationResult};
