use crate::error::Result;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};

/// Drives the compose-style orchestrator for one compose file.
pub struct ComposeDriver<'a> {
    runner: &'a dyn CommandRunner,
    command: &'a [String],
    compose_file: PathBuf,
    cwd: &'a Path,
}

impl<'a> ComposeDriver<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        command: &'a [String],
        compose_file: PathBuf,
        cwd: &'a Path,
    ) -> Self {
        Self {
            runner,
            command,
            compose_file,
            cwd,
        }
    }

    fn spec(&self) -> CommandSpec {
        CommandSpec::from_argv(self.command)
            .arg("-f")
            .arg(self.compose_file.to_string_lossy())
            .current_dir(self.cwd)
    }

    fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput> {
        tracing::info!(command = %spec.display(), "compose");
        self.runner.run(&spec)?.check(&spec.program)
    }

    pub fn build(&self, services: &[String]) -> Result<CommandOutput> {
        self.run_checked(self.spec().arg("build").args(services.iter().cloned()).echo(true))
    }

    pub fn up(&self) -> Result<CommandOutput> {
        self.run_checked(self.spec().args(["up", "-d"]).echo(true))
    }

    pub fn ps(&self) -> Result<CommandOutput> {
        self.run_checked(self.spec().arg("ps"))
    }
}
