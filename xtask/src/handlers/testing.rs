use crate::services::process::{Cmd, Step, execute};

/// Normalizes a crate name to the workspace naming convention.
#[must_use]
pub fn normalize_project_name(project: &str) -> String {
    if project == "shortly" || project == "xtask" || project.starts_with("shortly-") {
        project.to_owned()
    } else {
        format!("shortly-{project}")
    }
}

/// The test command for the workspace (`None` or `all`) or a single crate.
#[must_use]
pub fn test_step(project: Option<&str>, nextest: bool) -> Step {
    let mut args: Vec<String> =
        if nextest { vec!["nextest".into(), "run".into()] } else { vec!["test".into()] };

    match project.filter(|p| *p != "all") {
        Some(project) => args.extend(["-p".into(), normalize_project_name(project)]),
        None => args.push("--workspace".into()),
    }
    args.push("--all-features".into());

    if nextest {
        args.extend(
            ["--failure-output", "immediate-final", "--success-output", "never", "--status-level", "skip"]
                .map(String::from),
        );
    }
    Step::new("test", Cmd::new("cargo", args))
}

/// Runs tests, preferring `cargo-nextest` when installed.
///
/// # Errors
/// The test run fails.
pub fn run_tests(project: Option<&str>, dry_run: bool) -> anyhow::Result<()> {
    let nextest = std::process::Command::new("cargo-nextest").arg("--version").output().is_ok();
    println!("🧪 Running tests via '{}'...", if nextest { "nextest" } else { "cargo test" });
    execute(&[test_step(project, nextest)], dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_names_get_the_workspace_prefix() {
        assert_eq!(normalize_project_name("chat"), "shortly-chat");
        assert_eq!(normalize_project_name("shortly-links"), "shortly-links");
        assert_eq!(normalize_project_name("shortly"), "shortly");
    }

    #[test]
    fn workspace_and_single_crate_runs() {
        assert_eq!(test_step(None, false).to_string(), "cargo test --workspace --all-features");
        assert_eq!(test_step(Some("all"), false).to_string(), "cargo test --workspace --all-features");
        assert_eq!(
            test_step(Some("links"), false).to_string(),
            "cargo test -p shortly-links --all-features"
        );
        assert!(test_step(None, true).to_string().starts_with("cargo nextest run --workspace"));
    }
}
