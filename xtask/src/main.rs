#![warn(rust_2018_idioms, unused_lifetimes)]
#![allow(clippy::print_stderr, clippy::print_stdout)]

pub mod handlers;
pub mod models;
pub mod services;

use crate::handlers::{deploy, stack, testing};
use crate::models::args::{AppCommands, Cli};
use crate::services::docker::DockerCompose;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let docker = DockerCompose::with_file_path(&cli.compose_file);

    match &cli.command {
        AppCommands::Test { project } => testing::run_tests(project.as_deref(), cli.dry_run)?,
        AppCommands::Deploy(args) => deploy::deploy(args, cli.dry_run)?,
        command => {
            if let Some(step) = stack::step_for(&docker, command) {
                stack::handle(&docker, &step, cli.dry_run)?;
            }
        },
    }

    Ok(())
}
