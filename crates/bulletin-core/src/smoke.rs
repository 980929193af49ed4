//! Local smoke test: import the backend modules in-process and call them
//! with fixed sample inputs before anything is containerised.

use crate::error::Result;
use crate::runner::{CommandRunner, CommandSpec};
use crate::types::DeployPhase;
use serde::Serialize;
use std::path::Path;

const HYMN_SCRIPT: &str = r#"from modules.hymn_lookup import lookup_hymn
h = lookup_hymn("390")
print("  hymn 390:", h["title"])
print("  tune:", h["tune"])"#;

const CALENDAR_SCRIPT: &str = r#"from datetime import date
from modules.calendar_service import get_calendar_info
info = get_calendar_info(date(2026, 2, 8))
print("  day:", info.get("day_name"))
print("  season:", info.get("season"))
print("  colour:", info.get("colour"))
print("  RCL year:", info.get("rcl_year"))"#;

const LECTIONARY_SCRIPT: &str = r#"from datetime import date
from modules.lectionary_service import LectionaryService
readings = LectionaryService().get_readings(date(2026, 2, 8))
print("  source:", readings.get("source"))"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeCheck {
    pub name: &'static str,
    pub script: &'static str,
    /// Installed before a single retry; empty means no retry.
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmokeResult {
    pub name: &'static str,
    pub output: String,
    pub remediated: bool,
}

/// Checks for `phase`; Phase 2 adds calendar and lectionary.
pub fn checks_for(phase: DeployPhase, calendar_remediation: &[String]) -> Vec<SmokeCheck> {
    let mut checks = vec![SmokeCheck {
        name: "hymn",
        script: HYMN_SCRIPT,
        remediation: Vec::new(),
    }];
    if phase == DeployPhase::Lectionary {
        checks.push(SmokeCheck {
            name: "calendar",
            script: CALENDAR_SCRIPT,
            remediation: calendar_remediation.to_vec(),
        });
        checks.push(SmokeCheck {
            name: "lectionary",
            script: LECTIONARY_SCRIPT,
            remediation: Vec::new(),
        });
    }
    checks
}

pub struct SmokeTester<'a> {
    runner: &'a dyn CommandRunner,
    python: &'a str,
    backend_dir: &'a Path,
}

impl<'a> SmokeTester<'a> {
    pub fn new(runner: &'a dyn CommandRunner, python: &'a str, backend_dir: &'a Path) -> Self {
        Self {
            runner,
            python,
            backend_dir,
        }
    }

    pub fn install(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        let spec = CommandSpec::new(self.python)
            .args(["-m", "pip", "install", "--quiet"])
            .args(packages.iter().cloned());
        self.runner.run(&spec)?.check(&spec.program)?;
        Ok(())
    }

    /// Install `packages`, then run every check in order, stopping at the first failure.
    pub fn run(&self, packages: &[String], checks: &[SmokeCheck]) -> Result<Vec<SmokeResult>> {
        self.install(packages)?;
        checks.iter().map(|c| self.run_check(c)).collect()
    }

    fn run_check(&self, check: &SmokeCheck) -> Result<SmokeResult> {
        let spec = CommandSpec::new(self.python)
            .args(["-c", check.script])
            .current_dir(self.backend_dir);

        let first = self.runner.run(&spec)?;
        if first.success() || check.remediation.is_empty() {
            let output = first.check(&spec.program)?;
            return Ok(SmokeResult {
                name: check.name,
                output: output.combined(),
                remediated: false,
            });
        }

        tracing::warn!(check = check.name, "smoke check failed, installing remediation packages");
        self.install(&check.remediation)?;
        let retry = self.runner.run(&spec)?.check(&spec.program)?;
        Ok(SmokeResult {
            name: check.name,
            output: retry.combined(),
            remediated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use crate::runner::fake::{exit, FakeRunner};
    use std::cell::Cell;
    use std::rc::Rc;

    fn pkgs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn is_check(spec: &CommandSpec, needle: &str) -> bool {
        spec.args.first().map(String::as_str) == Some("-c")
            && spec.args.get(1).is_some_and(|s| s.contains(needle))
    }

    #[test]
    fn phase_one_only_checks_hymns() {
        let checks = checks_for(DeployPhase::Base, &pkgs(&["liturgical-calendar"]));
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name, "hymn");
        assert!(checks[0].script.contains("lookup_hymn(\"390\")"));
    }

    #[test]
    fn phase_two_checks_calendar_with_remediation() {
        let checks = checks_for(DeployPhase::Lectionary, &pkgs(&["liturgical-calendar"]));
        let names: Vec<_> = checks.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["hymn", "calendar", "lectionary"]);
        assert_eq!(checks[1].remediation, vec!["liturgical-calendar"]);
        assert!(checks[1].script.contains("date(2026, 2, 8)"));
    }

    #[test]
    fn all_checks_pass() {
        let runner = FakeRunner::exiting(0);
        let tester = SmokeTester::new(&runner, "python3", Path::new("/srv/b"));
        let results = tester
            .run(
                &pkgs(&["fastapi"]),
                &checks_for(DeployPhase::Lectionary, &pkgs(&["python-dateutil"])),
            )
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.remediated));
        assert_eq!(
            runner.rendered()[0],
            "python3 -m pip install --quiet fastapi"
        );
    }

    #[test]
    fn calendar_failure_retries_once_after_remediation() {
        let calendar_runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calendar_runs);
        let runner = FakeRunner::new(move |spec| {
            if is_check(spec, "calendar_service") {
                counter.set(counter.get() + 1);
                if counter.get() == 1 {
                    return exit(1);
                }
            }
            exit(0)
        });
        let tester = SmokeTester::new(&runner, "python3", Path::new("/srv/b"));
        let results = tester
            .run(
                &[],
                &checks_for(DeployPhase::Lectionary, &pkgs(&["liturgical-calendar"])),
            )
            .unwrap();

        assert_eq!(calendar_runs.get(), 2);
        assert!(results[1].remediated);
        assert!(runner
            .rendered()
            .contains(&"python3 -m pip install --quiet liturgical-calendar".to_string()));
    }

    #[test]
    fn calendar_gives_up_after_one_retry() {
        let runner = FakeRunner::new(|spec| {
            if is_check(spec, "calendar_service") {
                exit(1)
            } else {
                exit(0)
            }
        });
        let tester = SmokeTester::new(&runner, "python3", Path::new("/srv/b"));
        let err = tester
            .run(
                &[],
                &checks_for(DeployPhase::Lectionary, &pkgs(&["liturgical-calendar"])),
            )
            .unwrap_err();
        assert!(matches!(err, DeployError::CommandFailed { .. }));
        let calendar_calls = runner
            .calls
            .borrow()
            .iter()
            .filter(|s| is_check(s, "calendar_service"))
            .count();
        assert_eq!(calendar_calls, 2);
        // lectionary never ran
        assert!(!runner
            .calls
            .borrow()
            .iter()
            .any(|s| is_check(s, "lectionary_service")));
    }

    #[test]
    fn hymn_failure_is_not_retried() {
        let runner = FakeRunner::new(|spec| {
            if is_check(spec, "hymn_lookup") {
                exit(1)
            } else {
                exit(0)
            }
        });
        let tester = SmokeTester::new(&runner, "python3", Path::new("/srv/b"));
        assert!(tester
            .run(&[], &checks_for(DeployPhase::Base, &[]))
            .is_err());
        assert_eq!(runner.calls.borrow().len(), 1);
    }
}
