use anyhow::{Context, Result};
use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};

/// A single external command, kept as data so plans can be printed and tested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
}

impl Cmd {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { program: program.to_owned(), args: args.into_iter().map(Into::into).collect() }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Runs with inherited stdio.
    ///
    /// # Errors
    /// The program cannot be spawned or exits non-zero.
    pub fn run(&self) -> Result<()> {
        let status = self
            .command()
            .status()
            .with_context(|| format!("Failed to execute '{}'. Is it installed and in your PATH?", self.program))?;
        if !status.success() {
            anyhow::bail!("'{self}' failed with {status}");
        }
        Ok(())
    }

    /// Runs and returns stdout; stderr stays on the terminal.
    ///
    /// # Errors
    /// The program cannot be spawned or exits non-zero.
    pub fn output(&self) -> Result<Vec<u8>> {
        let output = self
            .command()
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to execute '{}'", self.program))?;
        if !output.status.success() {
            anyhow::bail!("'{self}' failed with {}", output.status);
        }
        Ok(output.stdout)
    }

    /// Runs with `input` written to stdin.
    ///
    /// # Errors
    /// The program cannot be spawned, its stdin cannot be written or it exits non-zero.
    pub fn run_with_stdin(&self, input: &[u8]) -> Result<()> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute '{}'", self.program))?;
        child
            .stdin
            .take()
            .context("Child stdin was not captured")?
            .write_all(input)
            .context("Failed to write child stdin")?;
        let status = child.wait()?;
        if !status.success() {
            anyhow::bail!("'{self}' failed with {status}");
        }
        Ok(())
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// One labelled step of a plan. `stdin` is another command whose stdout feeds this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub label: &'static str,
    pub cmd: Cmd,
    pub stdin: Option<Cmd>,
}

impl Step {
    pub const fn new(label: &'static str, cmd: Cmd) -> Self {
        Self { label, cmd, stdin: None }
    }

    #[must_use]
    pub fn piped_from(mut self, source: Cmd) -> Self {
        self.stdin = Some(source);
        self
    }

    /// # Errors
    /// Either command fails.
    pub fn run(&self) -> Result<()> {
        match &self.stdin {
            Some(source) => self.cmd.run_with_stdin(&source.output()?),
            None => self.cmd.run(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stdin {
            Some(source) => write!(f, "{source} | {}", self.cmd),
            None => write!(f, "{}", self.cmd),
        }
    }
}

/// Prints or executes `steps` in order, stopping at the first failure.
///
/// # Errors
/// The first failing step, with its label as context.
pub fn execute(steps: &[Step], dry_run: bool) -> Result<()> {
    let total = steps.len();
    for (i, step) in steps.iter().enumerate() {
        println!("[{}/{total}] {}: {step}", i + 1, step.label);
        if !dry_run {
            step.run().with_context(|| format!("Step '{}' failed", step.label))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let step = Step::new("login", Cmd::new("docker", ["login", "--password-stdin"]))
            .piped_from(Cmd::new("aws", ["ecr", "get-login-password"]));
        assert_eq!(step.to_string(), "aws ecr get-login-password | docker login --password-stdin");
    }

    #[test]
    fn missing_program_is_reported() {
        let err = Cmd::new("definitely-not-a-real-binary", ["--version"]).run().unwrap_err();
        assert!(err.to_string().contains("Is it installed"), "got: {err}");
    }

    #[test]
    fn dry_run_executes_nothing() {
        let steps = [Step::new("never", Cmd::new("definitely-not-a-real-binary", Vec::<String>::new()))];
        execute(&steps, true).unwrap();
    }
}
