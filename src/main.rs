// ABOUTME: Entry point for the dockyard CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, ContainerizeArgs, DeployArgs};
use dockyard::build::{ContainerizeRequest, TemplateHints, catalogue};
use dockyard::config::{self, DeployOptions, EngineConfig};
use dockyard::engine::Engine;
use dockyard::error::Result;
use dockyard::exec::ExecContext;
use dockyard::output::{Output, OutputMode};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output);
    match run(cli, &output).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            output.error(&e.to_string());
            std::process::exit(1);
        }
    }
}

/// Returns whether the command's aggregate result reported success.
async fn run(cli: Cli, output: &Output) -> Result<bool> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { image, force } => {
            config::init_config(&cwd, image.as_deref(), force)?;
            output.success(&format!("Created {}", cwd.join(config::CONFIG_FILENAME).display()));
            Ok(true)
        }
        Commands::Templates => {
            list_templates(output);
            Ok(true)
        }
        command => {
            let config = load_config(&cwd, cli.config.as_deref())?;
            let engine = Engine::local(config);
            let ctx = cancel_on_interrupt();
            dispatch(&engine, &ctx, command, output).await
        }
    }
}

async fn dispatch(engine: &Engine, ctx: &ExecContext, command: Commands, output: &Output) -> Result<bool> {
    match command {
        Commands::Containerize(args) => containerize(engine, ctx, args, output).await,
        Commands::Deploy(args) => {
            let options = deploy_options(engine.config(), &args);
            output.progress(&format!("Deploying {}...", args.manifest.display()));
            let result = engine.deploy(ctx, &args.manifest, &options).await;
            output.report("deployment", &result);
            Ok(result.success)
        }
        Commands::Validate {
            manifest,
            namespace,
            selector,
        } => {
            let namespace = engine
                .config()
                .namespace_or_default(namespace.as_deref().unwrap_or_default())
                .to_string();
            let validation = engine
                .deployment()
                .validate_deployment(ctx, &manifest, &namespace, selector.as_deref())
                .await;
            if output.mode() == OutputMode::Json {
                output.json(&validation);
            } else if validation.success {
                output.success(&format!(
                    "{}/{} pods ready in {}",
                    validation.pods_ready, validation.pods_total, validation.namespace
                ));
            } else if let Some(ref error) = validation.error {
                output.error(&error.to_string());
                if output.mode() == OutputMode::Normal && !error.diagnostics.is_empty() {
                    eprintln!("\n{}", error.diagnostics);
                }
            }
            Ok(validation.success)
        }
        Commands::Delete { manifest, namespace } => {
            let result = engine
                .deployment()
                .delete_deployment(ctx, &manifest, namespace.as_deref().unwrap_or_default())
                .await;
            output.report("deletion", &result);
            Ok(result.success)
        }
        Commands::Diff { manifest, namespace } => {
            let namespace = engine
                .config()
                .namespace_or_default(namespace.as_deref().unwrap_or_default())
                .to_string();
            match engine.deployment().preview_changes(ctx, &manifest, &namespace).await {
                Ok(diff) if output.mode() == OutputMode::Json => {
                    output.json(&serde_json::json!({ "success": true, "diff": diff }));
                    Ok(true)
                }
                Ok(diff) => {
                    if diff.trim().is_empty() {
                        output.success("No changes");
                    } else {
                        println!("{diff}");
                    }
                    Ok(true)
                }
                Err(error) => {
                    output.error(&error.to_string());
                    Ok(false)
                }
            }
        }
        Commands::Init { .. } | Commands::Templates => Ok(true),
    }
}

async fn containerize(engine: &Engine, ctx: &ExecContext, args: ContainerizeArgs, output: &Output) -> Result<bool> {
    let mut request = ContainerizeRequest::new(&args.dir, &engine.config().defaults);
    request.template = args.template;
    request.hints = TemplateHints {
        language: args.language.unwrap_or_default(),
        framework: args.framework.unwrap_or_default(),
        dependencies: args.dependencies,
        config_files: args.config_files,
    };
    if let Some(image) = args.image {
        request.build.image_name = image;
    }
    if let Some(registry) = args.registry {
        request.build.registry = registry;
    }
    request.build.no_cache |= args.no_cache;
    request.auto_push = args.push;
    request.lint = !args.no_lint;

    output.progress(&format!("Containerizing {}...", args.dir.display()));

    let Some(manifest) = args.deploy else {
        let result = engine.containerize(ctx, &request).await;
        output.report("build", &result);
        return Ok(result.success);
    };

    let options = engine.config().defaults.deploy.clone();
    let workflow = engine
        .containerize_and_deploy(ctx, &request, &manifest, &options)
        .await;
    if output.mode() == OutputMode::Json {
        output.json(&workflow);
        return Ok(workflow.success);
    }
    output.report("build", &workflow.build);
    if let Some(ref deploy) = workflow.deploy {
        output.report("deployment", deploy);
    }
    Ok(workflow.success)
}

fn deploy_options(config: &EngineConfig, args: &DeployArgs) -> DeployOptions {
    let mut options = config.defaults.deploy.clone();
    if let Some(ref namespace) = args.namespace {
        options.namespace = namespace.clone();
    }
    options.dry_run |= args.dry_run;
    options.force |= args.force;
    options.wait |= args.wait;
    if args.no_validate {
        options.validate = false;
    }
    if args.selector.is_some() {
        options.selector = args.selector.clone();
    }
    if let Some(timeout) = args.timeout {
        options.wait_timeout = timeout;
    }
    options
}

fn load_config(cwd: &Path, explicit: Option<&Path>) -> Result<EngineConfig> {
    let config = match explicit {
        Some(path) => EngineConfig::load(&resolve(cwd, path))?,
        None => EngineConfig::discover_or_default(cwd)?,
    };
    Ok(config.apply_env())
}

fn resolve(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn list_templates(output: &Output) {
    let templates = catalogue();
    if output.mode() == OutputMode::Json {
        let listing: Vec<_> = templates
            .iter()
            .map(|t| serde_json::json!({ "name": t.name, "description": t.description }))
            .collect();
        output.json(&listing);
        return;
    }
    for template in templates {
        println!("{:<22} {}", template.name, template.description);
    }
}

/// A root context cancelled on Ctrl-C, so running tools are killed instead of orphaned.
fn cancel_on_interrupt() -> ExecContext {
    let ctx = ExecContext::new();
    let handle = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling running commands");
            handle.cancel();
        }
    });
    ctx
}
