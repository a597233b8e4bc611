use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::build::ParallelMode;

mod build;
mod commands;
mod config;
mod deploy;
mod plugin;
mod site;
mod util;
mod walk;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The command to execute
    #[command(subcommand)]
    command: CactusCommand,

    /// Show debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Parser)]
struct ProjectArgs {
    /// The project directory
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// A config file; repeat to layer several, the first one wins
    #[arg(short, long = "config")]
    config: Vec<PathBuf>,
}

#[derive(Parser)]
struct InitArgs {
    /// The path to initialize the project in
    path: PathBuf,

    /// Whether to create the directory if it doesn't exist
    #[arg(short, long, default_value = "false")]
    create: bool,
}

#[derive(Parser)]
struct BuildArgs {
    /// How much of the build runs in parallel
    #[arg(long, value_enum, default_value_t = ParallelMode::default())]
    parallel: ParallelMode,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Parser)]
struct ServeArgs {
    /// The address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// The port to bind to
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Open the site in the default browser
    #[arg(short, long, default_value = "false")]
    open: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Parser)]
struct DeployArgs {
    /// How much of the build runs in parallel
    #[arg(long, value_enum, default_value_t = ParallelMode::default())]
    parallel: ParallelMode,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Parser)]
struct CleanArgs {
    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Parser)]
struct DomainArgs {
    #[command(subcommand)]
    action: DomainAction,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Subcommand)]
enum DomainAction {
    /// Point the configured domain at the published site
    Setup,

    /// List the domains pointing at the published site
    List,
}

#[derive(Subcommand)]
enum CactusCommand {
    /// Create a new cactus project
    Init(InitArgs),

    /// Build the site into .build
    Build(BuildArgs),

    /// Serve the site locally and rebuild on changes
    Serve(ServeArgs),

    /// Build the site into .deploy and publish it
    Deploy(DeployArgs),

    /// Remove the build output
    Clean(CleanArgs),

    /// Manage the domain of the published site
    Domain(DomainArgs),
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "cactus=debug" } else { "cactus=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        CactusCommand::Init(args) => {
            commands::init::run(&args).await?;
        }
        CactusCommand::Build(args) => {
            commands::build::run(&args).await?;
        }
        CactusCommand::Serve(args) => {
            commands::serve::run(&args).await?;
        }
        CactusCommand::Deploy(args) => {
            commands::deploy::run(&args).await?;
        }
        CactusCommand::Clean(args) => {
            commands::clean::run(&args).await?;
        }
        CactusCommand::Domain(args) => {
            commands::domain::run(&args).await?;
        }
    }

    Ok(())
}
