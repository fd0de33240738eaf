// ABOUTME: Engine configuration loaded from dockyard.yml.
// ABOUTME: Handles file discovery, tool paths, option defaults, and env overrides.

mod init;
mod options;

pub use init::init_config;
pub use options::{BuildOptions, DeployOptions, PushOptions, StageOptions};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILENAME: &str = "dockyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "dockyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".dockyard/config.yml";

pub const ENV_DOCKER: &str = "DOCKYARD_DOCKER";
pub const ENV_KUBECTL: &str = "DOCKYARD_KUBECTL";
pub const ENV_NAMESPACE: &str = "DOCKYARD_NAMESPACE";

pub const DEFAULT_NAMESPACE: &str = "default";

/// Explicit configuration handed to every service constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tools: ToolsConfig,
    pub default_namespace: String,
    pub defaults: StageOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            defaults: StageOptions::default(),
        }
    }
}

/// Executables for the two external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub docker: String,
    pub kubectl: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            docker: "docker".to_string(),
            kubectl: "kubectl".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like [`discover`](Self::discover), falling back to defaults when no
    /// file exists. Malformed files are still errors.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Override tool paths and namespace from `DOCKYARD_*` variables.
    pub fn apply_env(mut self) -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(docker) = read(ENV_DOCKER) {
            self.tools.docker = docker;
        }
        if let Some(kubectl) = read(ENV_KUBECTL) {
            self.tools.kubectl = kubectl;
        }
        if let Some(namespace) = read(ENV_NAMESPACE) {
            self.default_namespace = namespace;
        }
        self
    }

    /// The namespace to use when a request leaves it empty.
    pub fn namespace_or_default<'a>(&'a self, requested: &'a str) -> &'a str {
        if !requested.is_empty() {
            requested
        } else if !self.default_namespace.is_empty() {
            &self.default_namespace
        } else {
            DEFAULT_NAMESPACE
        }
    }

    fn validate(&self) -> Result<()> {
        if self.tools.docker.trim().is_empty() {
            return Err(Error::InvalidConfig("tools.docker cannot be empty".into()));
        }
        if self.tools.kubectl.trim().is_empty() {
            return Err(Error::InvalidConfig("tools.kubectl cannot be empty".into()));
        }
        Ok(())
    }
}
