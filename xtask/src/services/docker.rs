use crate::services::process::{Cmd, Step};
use anyhow::Result;
use std::path::Path;

pub const DEFAULT_COMPOSE_FILE: &str = "ops/docker/docker-compose.yml";

/// Builds `docker compose -f <file> ...` commands for the local stack.
#[derive(Debug)]
pub struct DockerCompose {
    file_path: String,
}

impl Default for DockerCompose {
    fn default() -> Self {
        Self { file_path: DEFAULT_COMPOSE_FILE.to_owned() }
    }
}

impl DockerCompose {
    pub fn with_file_path(path: impl Into<String>) -> Self {
        Self { file_path: path.into() }
    }

    /// Fails when the compose file is absent, before Docker prints a vaguer error.
    ///
    /// # Errors
    /// The compose file does not exist.
    pub fn ensure_file(&self) -> Result<()> {
        if !Path::new(&self.file_path).exists() {
            anyhow::bail!("Docker compose file not found at: {}", self.file_path);
        }
        Ok(())
    }

    pub fn command(&self, args: &[&str]) -> Cmd {
        let mut full = vec!["compose", "-f", self.file_path.as_str()];
        full.extend_from_slice(args);
        Cmd::new("docker", full)
    }

    pub fn build(&self) -> Step {
        Step::new("build", self.command(&["build"]))
    }

    pub fn up(&self) -> Step {
        Step::new("up", self.command(&["up", "-d"]))
    }

    pub fn down(&self, volumes: bool) -> Step {
        let args: &[&str] = if volumes { &["down", "-v"] } else { &["down"] };
        Step::new("down", self.command(args))
    }

    pub fn restart(&self) -> Step {
        Step::new("restart", self.command(&["restart"]))
    }

    pub fn logs(&self, service: Option<&str>) -> Step {
        let mut args = vec!["logs", "-f"];
        args.extend(service);
        Step::new("logs", self.command(&args))
    }

    pub fn clean(&self) -> Step {
        Step::new("clean", self.command(&["down", "-v", "--rmi", "local"]))
    }

    pub fn shell(&self, service: &str) -> Step {
        Step::new("shell", self.command(&["exec", service, "/bin/sh"]))
    }

    pub fn migrate(&self) -> Step {
        Step::new("migrate", self.command(&["exec", "app", "shortly-server", "migrate"]))
    }

    pub fn status(&self) -> Step {
        Step::new("status", self.command(&["ps"]))
    }
}
