//! Container rollout: registry login, image build with two tags, push, forced
//! service redeployment and a blocking wait for stability.

use crate::models::args::DeployArgs;
use crate::services::process::{Cmd, Step, execute};
use anyhow::{Context, Result};

/// Resolved deployment coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub registry: String,
    pub image: String,
    pub revision: String,
    pub steps: Vec<Step>,
}

impl DeployPlan {
    pub fn new(args: &DeployArgs, revision: &str) -> Self {
        let registry = format!("{}.dkr.ecr.{}.amazonaws.com", args.account, args.region);
        let image = format!("{registry}/{}", args.repository);
        let latest = format!("{image}:latest");
        let tagged = format!("{image}:{revision}");
        let region = args.region.as_str();

        let steps = vec![
            Step::new(
                "registry login",
                Cmd::new(
                    "docker",
                    ["login", "--username", "AWS", "--password-stdin", registry.as_str()],
                ),
            )
            .piped_from(Cmd::new("aws", ["ecr", "get-login-password", "--region", region])),
            Step::new(
                "build image",
                Cmd::new(
                    "docker",
                    ["build", "-f", args.dockerfile.as_str(), "-t", latest.as_str(), "-t", tagged.as_str(), "."],
                ),
            ),
            Step::new("push latest", Cmd::new("docker", ["push", latest.as_str()])),
            Step::new("push revision", Cmd::new("docker", ["push", tagged.as_str()])),
            Step::new(
                "force new deployment",
                Cmd::new(
                    "aws",
                    [
                        "ecs",
                        "update-service",
                        "--cluster",
                        args.cluster.as_str(),
                        "--service",
                        args.service.as_str(),
                        "--force-new-deployment",
                        "--region",
                        region,
                    ],
                ),
            ),
            Step::new(
                "wait for stable service",
                Cmd::new(
                    "aws",
                    [
                        "ecs",
                        "wait",
                        "services-stable",
                        "--cluster",
                        args.cluster.as_str(),
                        "--services",
                        args.service.as_str(),
                        "--region",
                        region,
                    ],
                ),
            ),
        ];

        Self { registry, image, revision: revision.to_owned(), steps }
    }
}

/// Short hash of `HEAD`, used as the image tag next to `latest`.
///
/// # Errors
/// `git` is unavailable or the directory is not a repository.
pub fn current_revision() -> Result<String> {
    let out = Cmd::new("git", ["rev-parse", "--short", "HEAD"]).output()?;
    let revision = String::from_utf8(out).context("git printed a non UTF-8 revision")?.trim().to_owned();
    if revision.is_empty() {
        anyhow::bail!("git returned an empty revision");
    }
    Ok(revision)
}

/// Builds the plan and runs it step by step; the first failure aborts the rollout.
///
/// # Errors
/// Revision lookup or any step fails.
pub fn deploy(args: &DeployArgs, dry_run: bool) -> Result<()> {
    let revision = match &args.revision {
        Some(revision) => revision.clone(),
        None => current_revision()?,
    };
    let plan = DeployPlan::new(args, &revision);

    println!("🚀 Deploying {}:{} to {}/{}", plan.image, plan.revision, args.cluster, args.service);
    execute(&plan.steps, dry_run)?;
    if !dry_run {
        println!("✅ Service {} is stable", args.service);
    }
    Ok(())
}
