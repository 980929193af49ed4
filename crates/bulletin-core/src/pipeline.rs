//! Test pipeline driver.
//!
//! Stages run strictly in order and each gates the next:
//! dependency check → test file check → optional server start → pytest →
//! cleanup. A server started here is owned by [`ServerGuard`], so it is
//! killed on every exit path, early aborts included.

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::health::{self, HealthProbe, HealthStatus};
use crate::paths::{Layout, TEST_FILE};
use crate::runner::{BackgroundProcess, CommandRunner, CommandSpec};
use crate::testplan::{TestOutcome, TestSelection};

pub const API_URL_ENV: &str = "BULLETIN_API_URL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOptions {
    pub selection: TestSelection,
    pub start_server: bool,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    DependencyPresent(String),
    DependencyInstalled(String),
    TestFileFound,
    ServerStarted { pid: u32, port: u16 },
    ServerHealthy(HealthStatus),
    RunningTests { command: String, api_url: String },
    ServerStopped { pid: u32 },
}

// ---------------------------------------------------------------------------
// ServerGuard
// ---------------------------------------------------------------------------

/// Kills the wrapped server process when dropped.
pub struct ServerGuard {
    process: Option<Box<dyn BackgroundProcess>>,
}

impl ServerGuard {
    pub fn new(process: Box<dyn BackgroundProcess>) -> Self {
        Self {
            process: Some(process),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.id())
    }

    /// Stop the server now. Returns its pid.
    pub fn stop(mut self) -> Option<u32> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<u32> {
        let mut process = self.process.take()?;
        let pid = process.id();
        if let Err(e) = process.terminate() {
            tracing::warn!(pid, error = %e, "failed to stop API server");
        } else {
            tracing::info!(pid, "API server stopped");
        }
        Some(pid)
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// TestPipeline
// ---------------------------------------------------------------------------

pub struct TestPipeline<'a> {
    layout: &'a Layout,
    config: &'a DeployConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn HealthProbe,
}

impl<'a> TestPipeline<'a> {
    pub fn new(
        layout: &'a Layout,
        config: &'a DeployConfig,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn HealthProbe,
    ) -> Self {
        Self {
            layout,
            config,
            runner,
            probe,
        }
    }

    pub fn run(
        &self,
        opts: &TestRunOptions,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<TestOutcome> {
        self.ensure_dependencies(&opts.selection, on_event)?;

        let test_file = self.layout.test_file();
        if !test_file.is_file() {
            return Err(DeployError::TestFileMissing(test_file));
        }
        on_event(PipelineEvent::TestFileFound);

        let (server, api_url) = if opts.start_server {
            let guard = self.start_server(opts.port, on_event)?;
            (Some(guard), local_url(opts.port))
        } else {
            (None, self.config.api_url.clone())
        };

        let result = self.execute(&opts.selection, &api_url, on_event);

        if let Some(pid) = server.and_then(ServerGuard::stop) {
            on_event(PipelineEvent::ServerStopped { pid });
        }
        result
    }

    fn python(&self) -> CommandSpec {
        CommandSpec::new(&self.config.python)
    }

    fn ensure_dependencies(
        &self,
        selection: &TestSelection,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<()> {
        for (module, package) in selection.required_packages() {
            let probe = self.python().args(["-c", &format!("import {module}")]);
            if self.runner.run(&probe)?.success() {
                on_event(PipelineEvent::DependencyPresent(package.to_string()));
                continue;
            }
            let install = self.python().args(["-m", "pip", "install", package]);
            self.runner.run(&install)?.check(&install.program)?;
            on_event(PipelineEvent::DependencyInstalled(package.to_string()));
        }
        Ok(())
    }

    fn start_server(
        &self,
        port: u16,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<ServerGuard> {
        let spec = self
            .python()
            .args(["-m", "uvicorn", "app:app", "--host", "127.0.0.1", "--port"])
            .arg(port.to_string())
            .current_dir(self.layout.backend_dir());
        let guard = ServerGuard::new(self.runner.spawn(&spec)?);
        let pid = guard.pid().unwrap_or_default();
        tracing::info!(pid, port, "API server started");
        on_event(PipelineEvent::ServerStarted { pid, port });

        // on failure the guard drops here and kills the server
        let status = health::wait_healthy(
            self.probe,
            &local_url(port),
            self.config.startup_delay(),
            self.config.health_attempts,
            self.config.health_interval(),
        )?;
        on_event(PipelineEvent::ServerHealthy(status));
        Ok(guard)
    }

    fn execute(
        &self,
        selection: &TestSelection,
        api_url: &str,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<TestOutcome> {
        let spec = self
            .python()
            .args(["-m", "pytest"])
            .args(selection.pytest_args(TEST_FILE))
            .current_dir(self.layout.backend_dir())
            .env(API_URL_ENV, api_url)
            .echo(true);
        on_event(PipelineEvent::RunningTests {
            command: spec.display(),
            api_url: api_url.to_string(),
        });
        let output = self.runner.run(&spec)?;
        let outcome = TestOutcome::from_code(output.code);
        tracing::info!(code = output.code, %outcome, "test run finished");
        Ok(outcome)
    }
}

fn local_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::{exit, FakeRunner};
    use tempfile::TempDir;

    struct StaticProbe(bool);

    impl HealthProbe for StaticProbe {
        fn check(&self, base_url: &str) -> Result<HealthStatus> {
            if self.0 {
                Ok(HealthStatus {
                    status: "healthy".into(),
                    modules: vec![],
                })
            } else {
                Err(DeployError::HealthCheck {
                    url: health::health_url(base_url),
                    reason: "connection refused".into(),
                })
            }
        }
    }

    fn fixture() -> (TempDir, Layout, DeployConfig) {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::create_dir_all(layout.backend_dir()).unwrap();
        std::fs::write(layout.test_file(), "def test_ok():\n    pass\n").unwrap();
        let config = DeployConfig {
            startup_delay_secs: 0,
            health_interval_secs: 0,
            ..DeployConfig::default()
        };
        (dir, layout, config)
    }

    fn pytest_exiting(code: i32) -> FakeRunner {
        FakeRunner::new(move |spec| {
            if spec.args.iter().any(|a| a == "pytest") {
                exit(code)
            } else {
                exit(0)
            }
        })
    }

    fn opts(start_server: bool) -> TestRunOptions {
        TestRunOptions {
            selection: TestSelection::default(),
            start_server,
            port: 8002,
        }
    }

    #[test]
    fn runner_exit_codes_pass_through() {
        let (_dir, layout, config) = fixture();
        let probe = StaticProbe(true);
        for (code, expected) in [
            (0, TestOutcome::Passed),
            (5, TestOutcome::NoTestsCollected),
            (2, TestOutcome::Failed(2)),
        ] {
            let runner = pytest_exiting(code);
            let pipeline = TestPipeline::new(&layout, &config, &runner, &probe);
            let outcome = pipeline.run(&opts(false), &mut |_| {}).unwrap();
            assert_eq!(outcome, expected);
            assert_eq!(outcome.exit_code(), code);
        }
    }

    #[test]
    fn missing_dependency_is_installed() {
        let (_dir, layout, config) = fixture();
        let runner = FakeRunner::new(|spec| {
            if spec.args == ["-c", "import httpx"] {
                exit(1)
            } else {
                exit(0)
            }
        });
        let probe = StaticProbe(true);
        let mut events = Vec::new();
        TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(false), &mut |e| events.push(e))
            .unwrap();

        assert!(runner
            .rendered()
            .contains(&"python3 -m pip install httpx".to_string()));
        assert!(events.contains(&PipelineEvent::DependencyInstalled("httpx".into())));
        assert!(events.contains(&PipelineEvent::DependencyPresent("pytest".into())));
    }

    #[test]
    fn failed_install_aborts_before_tests() {
        let (_dir, layout, config) = fixture();
        let runner = FakeRunner::exiting(1);
        let probe = StaticProbe(true);
        let err = TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(false), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, DeployError::CommandFailed { .. }));
        assert!(!runner.rendered().iter().any(|c| c.contains("pytest test_")));
    }

    #[test]
    fn missing_test_file_aborts() {
        let (_dir, layout, config) = fixture();
        std::fs::remove_file(layout.test_file()).unwrap();
        let runner = FakeRunner::exiting(0);
        let probe = StaticProbe(true);
        let err = TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(true), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, DeployError::TestFileMissing(_)));
        assert!(runner.spawned.borrow().is_empty());
    }

    #[test]
    fn server_is_stopped_after_passing_run() {
        let (_dir, layout, config) = fixture();
        let runner = pytest_exiting(0);
        let probe = StaticProbe(true);
        let mut events = Vec::new();
        let outcome = TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(true), &mut |e| events.push(e))
            .unwrap();

        assert_eq!(outcome, TestOutcome::Passed);
        assert_eq!(*runner.killed.borrow(), vec![4001]);
        assert_eq!(events.last(), Some(&PipelineEvent::ServerStopped { pid: 4001 }));

        let pytest = runner
            .calls
            .borrow()
            .iter()
            .find(|c| c.args.iter().any(|a| a == "pytest"))
            .cloned()
            .unwrap();
        assert!(pytest
            .env
            .contains(&(API_URL_ENV.to_string(), "http://127.0.0.1:8002".to_string())));
    }

    #[test]
    fn server_is_stopped_after_failing_run() {
        let (_dir, layout, config) = fixture();
        let runner = pytest_exiting(1);
        let probe = StaticProbe(true);
        let outcome = TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(true), &mut |_| {})
            .unwrap();
        assert_eq!(outcome, TestOutcome::Failed(1));
        assert_eq!(runner.killed.borrow().len(), 1);
    }

    #[test]
    fn failed_health_check_kills_server_and_aborts() {
        let (_dir, layout, config) = fixture();
        let runner = FakeRunner::exiting(0);
        let probe = StaticProbe(false);
        let err = TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(true), &mut |_| {})
            .unwrap_err();

        assert!(matches!(err, DeployError::HealthCheck { .. }));
        assert_eq!(*runner.killed.borrow(), vec![4001]);
        assert!(!runner
            .calls
            .borrow()
            .iter()
            .any(|c| c.args.iter().any(|a| a == "pytest")));
    }

    #[test]
    fn external_server_uses_configured_url() {
        let (_dir, layout, mut config) = fixture();
        config.api_url = "http://bulletin.local:8000".into();
        let runner = pytest_exiting(0);
        let probe = StaticProbe(false);
        let mut events = Vec::new();
        TestPipeline::new(&layout, &config, &runner, &probe)
            .run(&opts(false), &mut |e| events.push(e))
            .unwrap();

        assert!(runner.spawned.borrow().is_empty());
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::RunningTests { api_url, .. } if api_url == "http://bulletin.local:8000"
        )));
    }
}
