//! # CLI Argument Definitions
//!
//! Command-line surface of `cargo xtask`: local stack management through Docker
//! Compose, the test runner and the container deployment pipeline.

use clap::{Args, Parser, Subcommand};

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "cargo xtask")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Developer and operations toolkit for the Shortly workspace")]
pub struct Cli {
    /// Print the commands instead of running them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Compose file used by the local stack commands.
    #[arg(long, global = true, default_value = "ops/docker/docker-compose.yml")]
    pub compose_file: String,

    #[command(subcommand)]
    pub command: AppCommands,
}

#[derive(Debug, Subcommand)]
pub enum AppCommands {
    /// Build the container images
    Build,
    /// Start the stack in the background
    Up,
    /// Stop the stack
    Down {
        /// Also remove named volumes
        #[arg(short, long)]
        volumes: bool,
    },
    /// Restart every service
    Restart,
    /// Follow the logs of one service or all of them
    Logs {
        /// Service name (app, db); all services when omitted
        service: Option<String>,
    },
    /// Remove containers, volumes and locally built images
    Clean,
    /// Open a shell inside a running service
    Shell {
        #[arg(default_value = "app")]
        service: String,
    },
    /// Run tests (workspace by default)
    Test {
        /// Run tests for a specific crate (auto-prefixes with 'shortly-' if missing)
        project: Option<String>,
    },
    /// Apply database migrations inside the running app container
    Migrate,
    /// Show the state of the stack's services
    Status,
    /// Build, push and roll out the image to the container service
    Deploy(DeployArgs),
}

/// Registry and service coordinates for [`AppCommands::Deploy`].
#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    #[arg(long, env = "AWS_ACCOUNT_ID")]
    pub account: String,

    #[arg(long, env = "ECR_REPOSITORY", default_value = "shortly")]
    pub repository: String,

    #[arg(long, env = "ECS_CLUSTER", default_value = "shortly-cluster")]
    pub cluster: String,

    #[arg(long, env = "ECS_SERVICE", default_value = "shortly-service")]
    pub service: String,

    /// Image tag besides `latest`; the short hash of `HEAD` when omitted.
    #[arg(long)]
    pub revision: Option<String>,

    #[arg(long, default_value = "ops/docker/Dockerfile")]
    pub dockerfile: String,
}
