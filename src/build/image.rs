// ABOUTME: docker build/tag/push command construction and output parsing.
// ABOUTME: Output parsing is best-effort; missing facts are None, never errors.

use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use crate::config::BuildOptions;
use crate::exec::CommandSpec;
use crate::types::ImageRef;

static IMAGE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Successfully built ([0-9a-f]{6,64})|writing image sha256:([0-9a-f]{6,64}))")
        .expect("image id pattern compiles")
});

static DIGEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"digest: (sha256:[0-9a-f]{64})").expect("digest pattern compiles")
});

static LEGACY_STEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Step (\d+)/(\d+)").expect("step pattern compiles"));

static BUILDKIT_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*(?:([\w.-]+)\s+)?(\d+)/(\d+)\]").expect("buildkit step pattern compiles")
});

pub fn build_command(
    docker: &str,
    context_dir: &Path,
    dockerfile: &Path,
    image: &ImageRef,
    options: &BuildOptions,
) -> CommandSpec {
    let mut cmd = CommandSpec::new(docker)
        .arg("build")
        .args(["-t".to_string(), image.to_string()])
        .args(["-f".to_string(), dockerfile.display().to_string()]);

    for (key, value) in &options.build_args {
        cmd = cmd.args(["--build-arg".to_string(), format!("{key}={value}")]);
    }
    if let Some(ref target) = options.target {
        cmd = cmd.args(["--target", target.as_str()]);
    }
    if options.no_cache {
        cmd = cmd.arg("--no-cache");
    }
    for source in &options.cache_from {
        cmd = cmd.args(["--cache-from", source.as_str()]);
    }
    if let Some(ref platform) = options.platform {
        cmd = cmd.args(["--platform", platform.as_str()]);
    }

    cmd.arg(context_dir.display().to_string()).cwd(context_dir)
}

pub fn tag_command(docker: &str, source: &ImageRef, target: &ImageRef) -> CommandSpec {
    CommandSpec::new(docker)
        .arg("tag")
        .args([source.to_string(), target.to_string()])
}

pub fn push_command(docker: &str, image: &ImageRef) -> CommandSpec {
    CommandSpec::new(docker).arg("push").arg(image.to_string())
}

/// Facts recovered from `docker build` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub image_id: Option<String>,
    /// Build steps seen, which is also the number of layers touched.
    pub layers: usize,
}

pub fn parse_build_output(output: &str) -> BuildSummary {
    let image_id = IMAGE_ID
        .captures_iter(output)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
        .last();

    let legacy = LEGACY_STEP
        .captures_iter(output)
        .filter_map(|c| c.get(2)?.as_str().parse::<usize>().ok())
        .max();

    let layers = match legacy {
        Some(total) => total,
        None => BUILDKIT_STEP
            .captures_iter(output)
            .filter_map(|c| {
                let stage = c.get(1).map(|m| m.as_str()).unwrap_or_default();
                let step = c.get(2)?.as_str();
                Some(format!("{stage}#{step}"))
            })
            .collect::<BTreeSet<_>>()
            .len(),
    };

    BuildSummary { image_id, layers }
}

/// The manifest digest reported by `docker push`.
pub fn parse_push_digest(output: &str) -> Option<String> {
    DIGEST
        .captures_iter(output)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .last()
}
