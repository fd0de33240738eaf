// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use dockyard::output::OutputMode;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(about = "Build container images from templates and deploy them to Kubernetes")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputMode::Normal)]
    pub output: OutputMode,

    /// Path to a configuration file (default: discover in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new dockyard.yml configuration file
    Init {
        /// Default image name
        #[arg(short, long)]
        image: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate a Dockerfile, build the image, and optionally push it
    Containerize(ContainerizeArgs),

    /// Apply a manifest and check pod health
    Deploy(DeployArgs),

    /// Check pod health in a namespace without applying anything
    Validate {
        /// Manifest the pods belong to (used to label the result)
        manifest: PathBuf,

        #[arg(short, long)]
        namespace: Option<String>,

        /// Label selector narrowing the pods checked
        #[arg(short = 'l', long)]
        selector: Option<String>,
    },

    /// Delete everything a manifest describes
    Delete {
        manifest: PathBuf,

        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show what applying a manifest would change
    Diff {
        manifest: PathBuf,

        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// List the built-in Dockerfile templates
    Templates,
}

#[derive(Args)]
pub struct ContainerizeArgs {
    /// Directory to containerize
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Template to use (e.g. python, dockerfile-go); selected from hints when omitted
    #[arg(short, long)]
    pub template: Option<String>,

    /// Detected language
    #[arg(long)]
    pub language: Option<String>,

    /// Detected framework
    #[arg(long)]
    pub framework: Option<String>,

    /// Detected dependency (repeatable)
    #[arg(long = "dependency")]
    pub dependencies: Vec<String>,

    /// Config file present in the project (repeatable)
    #[arg(long = "config-file")]
    pub config_files: Vec<String>,

    /// Image name, optionally with a tag
    #[arg(short, long)]
    pub image: Option<String>,

    /// Registry to push to
    #[arg(long)]
    pub registry: Option<String>,

    /// Push after a successful build
    #[arg(long)]
    pub push: bool,

    /// Skip Dockerfile linting
    #[arg(long)]
    pub no_lint: bool,

    /// Build without the layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Apply this manifest once the build succeeds
    #[arg(long, value_name = "MANIFEST")]
    pub deploy: Option<PathBuf>,
}

#[derive(Args)]
pub struct DeployArgs {
    pub manifest: PathBuf,

    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Server-side dry run
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub force: bool,

    /// Wait for resources to become ready during apply
    #[arg(long)]
    pub wait: bool,

    /// Skip post-apply pod validation
    #[arg(long)]
    pub no_validate: bool,

    /// Label selector for post-apply validation
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Apply timeout (e.g. 90s, 5m)
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub timeout: Option<Duration>,
}
