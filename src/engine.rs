// ABOUTME: Orchestration engine composing the build pipeline and deployment service.
// ABOUTME: Holds only configuration and the command seam; every call builds its own result.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::build::{BuildPipeline, ContainerizationResult, ContainerizeRequest};
use crate::config::{DeployOptions, EngineConfig};
use crate::deploy::{DeploymentResult, DeploymentService};
use crate::exec::{CommandRunner, ExecContext, ProcessRunner};

/// Outcome of `containerize_and_deploy`.
///
/// `deploy` is `None` when the build did not succeed. A failed deploy never
/// changes the build aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub build: ContainerizationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeploymentResult>,
}

pub struct Engine {
    config: Arc<EngineConfig>,
    build: BuildPipeline,
    deployment: DeploymentService,
}

impl Engine {
    pub fn new(config: EngineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let config = Arc::new(config);
        Self {
            build: BuildPipeline::new(Arc::clone(&config), Arc::clone(&runner)),
            deployment: DeploymentService::new(Arc::clone(&config), runner),
            config,
        }
    }

    /// An engine that runs docker and kubectl as local processes.
    pub fn local(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(ProcessRunner::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build(&self) -> &BuildPipeline {
        &self.build
    }

    pub fn deployment(&self) -> &DeploymentService {
        &self.deployment
    }

    pub async fn containerize(&self, ctx: &ExecContext, request: &ContainerizeRequest) -> ContainerizationResult {
        self.build.containerize(ctx, request).await
    }

    pub async fn deploy(&self, ctx: &ExecContext, manifest: &Path, options: &DeployOptions) -> DeploymentResult {
        self.deployment.deploy_manifest(ctx, manifest, options).await
    }

    /// Build, then deploy only if every required build stage succeeded.
    pub async fn containerize_and_deploy(
        &self,
        ctx: &ExecContext,
        request: &ContainerizeRequest,
        manifest: &Path,
        options: &DeployOptions,
    ) -> WorkflowResult {
        let build = self.containerize(ctx, request).await;
        if !build.success {
            tracing::warn!(
                failed_stage = ?build.failed_stage,
                manifest = %manifest.display(),
                "skipping deployment after failed build"
            );
            return WorkflowResult {
                success: false,
                build,
                deploy: None,
            };
        }

        let deploy = self.deploy(ctx, manifest, options).await;
        WorkflowResult {
            success: deploy.success,
            build,
            deploy: Some(deploy),
        }
    }
}
