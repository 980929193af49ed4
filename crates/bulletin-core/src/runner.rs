//! External command invocation.
//!
//! Every program the toolkit drives (the compose orchestrator, pip, the
//! route patcher, pytest, the API server) goes through [`CommandRunner`].
//! The trait is narrow: run to completion and hand back the
//! exit code plus captured output, or spawn a background process that can
//! later be terminated.
//!
//! # Output handling
//! stdout and stderr are read on dedicated threads so a chatty child can
//! never fill a pipe buffer and deadlock. With [`CommandSpec::echo`] set,
//! each line is forwarded to our own stdout/stderr as it arrives instead of
//! being captured, so long image builds and test runs stream live. A runner
//! built with [`SystemRunner::echo_to_stderr`] sends echoed stdout to stderr
//! as well, which keeps our own stdout free for a JSON report.
//!
//! Streams are read as raw bytes to EOF and decoded lossily, so a child that
//! prints invalid UTF-8 is never cut off mid-run.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::{DeployError, Result};

/// Captured output is capped to this many bytes (keeping the tail).
const MAX_CAPTURE: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub echo: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            echo: false,
        }
    }

    /// Build from an argv-style list, e.g. `["docker", "compose"]`.
    pub fn from_argv(argv: &[String]) -> Self {
        let mut spec = Self::new(argv.first().cloned().unwrap_or_default());
        spec.args.extend(argv.iter().skip(1).cloned());
        spec
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Shell-like rendering for logs and dry output.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// CommandOutput
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// stdout and stderr joined, trimmed.
    pub fn combined(&self) -> String {
        let out = self.stdout.trim();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (true, _) => err.to_string(),
            (_, true) => out.to_string(),
            _ => format!("{out}\n{err}"),
        }
    }

    /// Turn a non-zero exit into [`DeployError::CommandFailed`].
    pub fn check(self, program: &str) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(DeployError::CommandFailed {
            program: program.to_string(),
            code: self.code,
            output: self.combined(),
        })
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A process left running in the background.
pub trait BackgroundProcess {
    fn id(&self) -> u32;

    /// Forcibly stop the process and reap it. Idempotent.
    fn terminate(&mut self) -> Result<()>;
}

pub trait CommandRunner {
    /// Run to completion. A non-zero exit is reported in the output, not as an error.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>>;
}

// ---------------------------------------------------------------------------
// SystemRunner
// ---------------------------------------------------------------------------

/// Runs real processes via `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner {
    echo_to_stderr: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route echoed stdout lines to stderr instead of stdout.
    pub fn echo_to_stderr(mut self, yes: bool) -> Self {
        self.echo_to_stderr = yes;
        self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        cmd
    }

    fn spawn_error(spec: &CommandSpec, e: std::io::Error) -> DeployError {
        let reason = if e.kind() == std::io::ErrorKind::NotFound
            && which::which(&spec.program).is_err()
        {
            format!("'{}' is not installed or not on PATH", spec.program)
        } else {
            e.to_string()
        };
        DeployError::Spawn {
            program: spec.program.clone(),
            reason,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec.display(), cwd = ?spec.cwd, "running");

        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let (out_sink, err_sink) = match (spec.echo, self.echo_to_stderr) {
            (false, _) => (Sink::Capture, Sink::Capture),
            (true, false) => (Sink::Stdout, Sink::Stderr),
            (true, true) => (Sink::Stderr, Sink::Stderr),
        };
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_thread = std::thread::spawn(move || drain(stdout_handle, out_sink));
        let stderr_thread = std::thread::spawn(move || drain(stderr_handle, err_sink));

        let status = child.wait()?;
        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        let code = status.code().unwrap_or(-1);
        tracing::debug!(program = %spec.program, code, "finished");
        Ok(CommandOutput {
            code,
            stdout,
            stderr,
        })
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn BackgroundProcess>> {
        tracing::debug!(command = %spec.display(), cwd = ?spec.cwd, "spawning background process");
        let child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;
        Ok(Box::new(ChildProcess { child }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Capture,
    Stdout,
    Stderr,
}

/// Read a child stream to EOF, capturing it or echoing each line to `sink`.
fn drain<R: Read>(reader: Option<R>, sink: Sink) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let mut reader = BufReader::new(reader);
    let mut buf = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "child stream read failed");
                break;
            }
        }
        let text = String::from_utf8_lossy(&line);
        match sink {
            Sink::Capture => {
                buf.push_str(text.trim_end_matches(['\r', '\n']));
                buf.push('\n');
            }
            Sink::Stdout => {
                let _ = writeln!(std::io::stdout(), "{}", text.trim_end_matches('\n'));
            }
            Sink::Stderr => {
                let _ = writeln!(std::io::stderr(), "{}", text.trim_end_matches('\n'));
            }
        }
    }
    cap_tail(buf)
}

fn cap_tail(mut s: String) -> String {
    if s.len() <= MAX_CAPTURE {
        return s;
    }
    let mut cut = s.len() - MAX_CAPTURE;
    while !s.is_char_boundary(cut) {
        cut += 1;
    }
    s.split_off(cut)
}

// ---------------------------------------------------------------------------
// ChildProcess
// ---------------------------------------------------------------------------

struct ChildProcess {
    child: Child,
}

impl BackgroundProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn terminate(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_some() {
            return Ok(());
        }
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
