use assert_cmd::Command;
use predicates::prelude::*;

fn xtask() -> Command {
    Command::cargo_bin("xtask").unwrap()
}

#[test]
fn help_lists_every_target() {
    let assert = xtask().arg("--help").assert().success();
    let out = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    for target in
        ["build", "up", "down", "restart", "logs", "clean", "shell", "test", "migrate", "status", "deploy"]
    {
        assert!(out.contains(target), "missing {target} in help");
    }
}

#[test]
fn dry_run_prints_compose_command() {
    xtask()
        .args(["--dry-run", "down", "-v"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docker compose -f ops/docker/docker-compose.yml down -v"));
}

#[test]
fn shell_defaults_to_app_service() {
    xtask()
        .args(["--dry-run", "shell"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exec app /bin/sh"));
}

#[test]
fn missing_compose_file_fails() {
    xtask()
        .args(["--compose-file", "does/not/exist.yml", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Docker compose file not found"));
}

#[test]
fn deploy_dry_run_prints_the_plan() {
    xtask()
        .args([
            "--dry-run",
            "deploy",
            "--account",
            "123456789012",
            "--region",
            "us-east-1",
            "--revision",
            "abc1234",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[1/6] registry login")
                .and(predicate::str::contains("shortly:abc1234"))
                .and(predicate::str::contains("[6/6] wait for stable service")),
        );
}

#[test]
fn deploy_requires_an_account() {
    xtask()
        .env_remove("AWS_ACCOUNT_ID")
        .args(["--dry-run", "deploy", "--revision", "abc1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--account"));
}
