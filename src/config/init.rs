// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Writes a commented dockyard.yml with the built-in defaults.

use humantime_serde::re::humantime::format_duration;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::ImageRef;

use super::{CONFIG_FILENAME, EngineConfig};

pub fn init_config(dir: &Path, image: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = EngineConfig::default();
    if let Some(i) = image {
        let image = ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.defaults.build.image_name = image.to_string();
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;
    Ok(())
}

fn generate_template_yaml(config: &EngineConfig) -> String {
    let build = &config.defaults.build;
    let push = &config.defaults.push;
    let deploy = &config.defaults.deploy;
    format!(
        r#"tools:
  docker: {docker}
  kubectl: {kubectl}
default_namespace: {namespace}

defaults:
  build:
    image_name: {image}
    # Set a registry to tag and push after a successful build.
    # registry: ghcr.io/acme
    timeout: {build_timeout}
  push:
    retry_count: {retries}
    timeout: {push_timeout}
  deploy:
    validate: {validate}
    wait_timeout: {wait_timeout}
    # selector: app=web
"#,
        docker = config.tools.docker,
        kubectl = config.tools.kubectl,
        namespace = config.default_namespace,
        image = build.image_name,
        build_timeout = format_duration(build.timeout),
        retries = push.retry_count,
        push_timeout = format_duration(push.timeout),
        validate = deploy.validate,
        wait_timeout = format_duration(deploy.wait_timeout),
    )
}
