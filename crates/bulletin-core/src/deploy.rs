//! Deploy sequence for phase 1 and phase 2 installs.
//!
//! Phase 1: provision directories → verify files → build images →
//! start stack → settle → status.
//!
//! Phase 2: provision directories → verify the backend is installed → copy modules →
//! append requirements → patch routes → build → start.
//!
//! Every step gates the next. With `local_test_only` the smoke test replaces
//! everything after verification (and the phase 2 patch) and ends the run.

use crate::compose::ComposeDriver;
use crate::config::DeployConfig;
use crate::error::Result;
use crate::manifest::{self, FileCheck};
use crate::paths::Layout;
use crate::patcher;
use crate::provision::{self, DirReport};
use crate::routes::{self, PatchOutcome};
use crate::runner::CommandRunner;
use crate::smoke::{self, SmokeResult, SmokeTester};
use crate::types::DeployPhase;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    pub phase: DeployPhase,
    pub skip_build: bool,
    pub skip_deploy: bool,
    pub local_test_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployEvent {
    Directory(DirReport),
    File(FileCheck),
    ModuleCopied { source: PathBuf, dest: PathBuf },
    RequirementsAppended(Vec<String>),
    RoutesPatched(String),
    SmokePassed(SmokeResult),
    BuildStarted(Vec<String>),
    ImagesBuilt,
    StackStarted,
    Settling(Duration),
    Status(String),
    Skipped(&'static str),
}

pub struct Deployer<'a> {
    layout: &'a Layout,
    config: &'a DeployConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> Deployer<'a> {
    pub fn new(layout: &'a Layout, config: &'a DeployConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            layout,
            config,
            runner,
        }
    }

    pub fn run(&self, opts: &DeployOptions, on_event: &mut dyn FnMut(DeployEvent)) -> Result<()> {
        tracing::info!(phase = opts.phase.number(), root = %self.layout.root().display(), "deploy");

        for report in provision::provision_dirs(&self.layout.volume_dirs())? {
            on_event(DeployEvent::Directory(report));
        }

        let report = manifest::verify(&self.layout.required_files(opts.phase));
        for check in &report.checks {
            on_event(DeployEvent::File(check.clone()));
        }
        report.into_result()?;

        if opts.phase == DeployPhase::Lectionary {
            self.patch_phase2(on_event)?;
        }

        if opts.local_test_only {
            return self.smoke_test(opts.phase, on_event);
        }

        let compose = ComposeDriver::new(
            self.runner,
            &self.config.compose_command,
            self.layout.join(&self.config.compose_file),
            self.layout.root(),
        );

        if opts.skip_build {
            on_event(DeployEvent::Skipped("build"));
        } else {
            on_event(DeployEvent::BuildStarted(self.config.build_services.clone()));
            compose.build(&self.config.build_services)?;
            on_event(DeployEvent::ImagesBuilt);
        }

        if opts.skip_deploy {
            on_event(DeployEvent::Skipped("deploy"));
            return Ok(());
        }
        compose.up()?;
        on_event(DeployEvent::StackStarted);

        let delay = self.config.settle_delay();
        on_event(DeployEvent::Settling(delay));
        std::thread::sleep(delay);

        let status = compose.ps()?;
        on_event(DeployEvent::Status(status.stdout));
        Ok(())
    }

    fn patch_phase2(&self, on_event: &mut dyn FnMut(DeployEvent)) -> Result<()> {
        let staging = self.layout.join(&self.config.staging_dir);
        let copies = self.layout.phase2_modules(&staging);
        patcher::copy_modules(&copies)?;
        for (source, dest) in copies {
            on_event(DeployEvent::ModuleCopied { source, dest });
        }

        let added = patcher::append_requirements(
            &self.layout.requirements_file(),
            &self.config.phase2_requirements,
        )?;
        on_event(DeployEvent::RequirementsAppended(added));

        let app = self.layout.app_file();
        let note = match &self.config.route_patcher {
            Some(patcher) => {
                patcher::patch_routes(self.runner, patcher, &app, self.layout.root())?.combined()
            }
            None => match routes::patch_app(&app)? {
                PatchOutcome::Patched => "calendar and lectionary routes added".to_string(),
                PatchOutcome::AlreadyPatched => "routes already present".to_string(),
            },
        };
        on_event(DeployEvent::RoutesPatched(note));
        Ok(())
    }

    fn smoke_test(&self, phase: DeployPhase, on_event: &mut dyn FnMut(DeployEvent)) -> Result<()> {
        let backend = self.layout.backend_dir();
        let tester = SmokeTester::new(self.runner, &self.config.python, &backend);
        let checks = smoke::checks_for(phase, &self.config.calendar_remediation);
        for result in tester.run(&self.config.smoke_packages, &checks)? {
            on_event(DeployEvent::SmokePassed(result));
        }
        Ok(())
    }
}
