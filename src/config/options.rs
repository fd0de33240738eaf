// ABOUTME: Per-stage options for build, push, and deploy.
// ABOUTME: Every field has a default so partial YAML and CLI overrides compose.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Options for every stage of both pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    pub build: BuildOptions,
    pub push: PushOptions,
    pub deploy: DeployOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Repository name and optional tag, e.g. `acme/web:v2`.
    pub image_name: String,
    /// Push target; empty disables push.
    pub registry: String,
    pub build_args: BTreeMap<String, String>,
    /// Multi-stage target.
    pub target: Option<String>,
    pub no_cache: bool,
    pub cache_from: Vec<String>,
    pub platform: Option<String>,
    /// Zero defers to the caller's context.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            image_name: "app".to_string(),
            registry: String::new(),
            build_args: BTreeMap::new(),
            target: None,
            no_cache: false,
            cache_from: Vec::new(),
            platform: None,
            timeout: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushOptions {
    /// Extra attempts after the first failure.
    pub retry_count: u32,
    /// Per attempt. Zero defers to the caller's context.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            retry_count: 3,
            timeout: Duration::from_secs(300),
            retry_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployOptions {
    /// Empty means the engine's default namespace.
    pub namespace: String,
    pub wait: bool,
    /// Bounds the apply call. Zero defers to the caller's context.
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    pub dry_run: bool,
    pub force: bool,
    pub validate: bool,
    /// Label selector narrowing post-apply validation.
    pub selector: Option<String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            wait: false,
            wait_timeout: Duration::from_secs(300),
            dry_run: false,
            force: false,
            validate: true,
            selector: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let options: StageOptions = serde_yaml::from_str(
            "build:\n  registry: ghcr.io/acme\npush:\n  retry_count: 1\n  retry_delay: 250ms\n",
        )
        .unwrap();
        assert_eq!(options.build.registry, "ghcr.io/acme");
        assert_eq!(options.build.image_name, "app");
        assert_eq!(options.push.retry_count, 1);
        assert_eq!(options.push.retry_delay, Duration::from_millis(250));
        assert_eq!(options.push.timeout, Duration::from_secs(300));
        assert!(options.deploy.validate);
    }

    #[test]
    fn durations_use_humantime() {
        let deploy: DeployOptions = serde_yaml::from_str("wait_timeout: 2m 30s\n").unwrap();
        assert_eq!(deploy.wait_timeout, Duration::from_secs(150));
    }
}
