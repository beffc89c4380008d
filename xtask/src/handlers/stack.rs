use crate::models::args::AppCommands;
use crate::services::docker::DockerCompose;
use crate::services::process::{Step, execute};
use anyhow::Result;

/// The compose step for a local stack command, `None` for commands handled elsewhere.
pub fn step_for(docker: &DockerCompose, command: &AppCommands) -> Option<Step> {
    let step = match command {
        AppCommands::Build => docker.build(),
        AppCommands::Up => docker.up(),
        AppCommands::Down { volumes } => docker.down(*volumes),
        AppCommands::Restart => docker.restart(),
        AppCommands::Logs { service } => docker.logs(service.as_deref()),
        AppCommands::Clean => docker.clean(),
        AppCommands::Shell { service } => docker.shell(service),
        AppCommands::Migrate => docker.migrate(),
        AppCommands::Status => docker.status(),
        AppCommands::Test { .. } | AppCommands::Deploy(_) => return None,
    };
    Some(step)
}

/// Runs one local stack command through Docker Compose.
///
/// # Errors
/// The compose file is missing or the command fails.
pub fn handle(docker: &DockerCompose, step: &Step, dry_run: bool) -> Result<()> {
    if !dry_run {
        docker.ensure_file()?;
    }
    execute(std::slice::from_ref(step), dry_run)?;

    if !dry_run && step.label == "up" {
        println!("\n✨ Stack is up.");
        println!("🔗 API: http://localhost:8000/api-docs");
        println!("🔗 SurrealDB: ws://localhost:8101");
    }
    Ok(())
}
