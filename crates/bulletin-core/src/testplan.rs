//! Test selection for the bulletin API suite.
//!
//! A selection combines up to three independent filters into a single
//! pytest invocation: a category, a feature phase, and coverage.

use crate::error::{DeployError, Result};
use serde::Serialize;
use std::fmt;

/// pytest's exit code when the filter matched nothing.
pub const NO_TESTS_COLLECTED: i32 = 5;

/// Phase → test classes covering that phase's features.
pub const PHASE_FILTERS: &[(u8, &str)] = &[
    (1, "TestSmoke or TestHymnLookup or TestDocxGenerator"),
    (2, "TestCalendarService or TestLectionaryService"),
    (3, "TestMusicServiceLookup or TestMusicPlan"),
    (4, "TestAssetExtractor"),
];

const COVERAGE_ARGS: &[&str] = &["--cov=modules", "--cov-report=term-missing"];

pub fn phase_filter(phase: u8) -> Option<&'static str> {
    PHASE_FILTERS
        .iter()
        .find(|(p, _)| *p == phase)
        .map(|(_, expr)| *expr)
}

// ---------------------------------------------------------------------------
// TestCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Smoke,
    Unit,
    Integration,
}

impl TestCategory {
    pub fn expression(self) -> &'static str {
        match self {
            TestCategory::Smoke => "TestSmoke",
            TestCategory::Unit => "not TestAPIEndpoints",
            TestCategory::Integration => "TestAPIEndpoints",
        }
    }

    /// First set flag wins, checked smoke → unit → integration.
    pub fn from_flags(smoke: bool, unit: bool, integration: bool) -> Option<Self> {
        if smoke {
            Some(TestCategory::Smoke)
        } else if unit {
            Some(TestCategory::Unit)
        } else if integration {
            Some(TestCategory::Integration)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// TestSelection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestSelection {
    pub category: Option<TestCategory>,
    pub phase: Option<u8>,
    pub coverage: bool,
}

impl TestSelection {
    pub fn new(category: Option<TestCategory>, phase: Option<u8>, coverage: bool) -> Result<Self> {
        if let Some(p) = phase {
            if phase_filter(p).is_none() {
                return Err(DeployError::UnknownPhase(p));
            }
        }
        Ok(Self {
            category,
            phase,
            coverage,
        })
    }

    /// The `-k` expression, or `None` to run everything.
    pub fn filter_expression(&self) -> Option<String> {
        let category = self.category.map(TestCategory::expression);
        let phase = self.phase.and_then(phase_filter);
        match (category, phase) {
            (Some(c), Some(p)) => Some(format!("({c}) and ({p})")),
            (Some(c), None) => Some(c.to_string()),
            (None, Some(p)) => Some(p.to_string()),
            (None, None) => None,
        }
    }

    /// Arguments after `python -m pytest`.
    pub fn pytest_args(&self, test_file: &str) -> Vec<String> {
        let mut args = vec![
            test_file.to_string(),
            "-v".to_string(),
            "--tb=short".to_string(),
        ];
        if let Some(expr) = self.filter_expression() {
            args.push("-k".to_string());
            args.push(expr);
        }
        if self.coverage {
            args.extend(COVERAGE_ARGS.iter().map(|a| a.to_string()));
        }
        args
    }

    /// `(import name, pip package)` pairs the run needs.
    pub fn required_packages(&self) -> Vec<(&'static str, &'static str)> {
        let mut pkgs = vec![("pytest", "pytest"), ("httpx", "httpx")];
        if self.coverage {
            pkgs.push(("pytest_cov", "pytest-cov"));
        }
        pkgs
    }
}

// ---------------------------------------------------------------------------
// TestOutcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "code", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    NoTestsCollected,
    Failed(i32),
}

impl TestOutcome {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => TestOutcome::Passed,
            NO_TESTS_COLLECTED => TestOutcome::NoTestsCollected,
            other => TestOutcome::Failed(other),
        }
    }

    /// Mirrors the runner's own exit code.
    pub fn exit_code(self) -> i32 {
        match self {
            TestOutcome::Passed => 0,
            TestOutcome::NoTestsCollected => NO_TESTS_COLLECTED,
            TestOutcome::Failed(code) => code,
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "all selected tests passed"),
            TestOutcome::NoTestsCollected => write!(f, "no tests matched the filter"),
            TestOutcome::Failed(code) => write!(f, "tests failed (exit code {code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_two_selects_calendar_and_lectionary() {
        let sel = TestSelection::new(None, Some(2), false).unwrap();
        assert_eq!(
            sel.filter_expression().as_deref(),
            Some("TestCalendarService or TestLectionaryService")
        );
    }

    #[test]
    fn unknown_phase_is_rejected() {
        assert!(matches!(
            TestSelection::new(None, Some(9), false),
            Err(DeployError::UnknownPhase(9))
        ));
    }

    #[test]
    fn category_and_phase_combine() {
        let sel = TestSelection::new(Some(TestCategory::Unit), Some(4), false).unwrap();
        assert_eq!(
            sel.filter_expression().as_deref(),
            Some("(not TestAPIEndpoints) and (TestAssetExtractor)")
        );
    }

    #[test]
    fn smoke_wins_over_other_categories() {
        assert_eq!(
            TestCategory::from_flags(true, true, true),
            Some(TestCategory::Smoke)
        );
        assert_eq!(
            TestCategory::from_flags(false, true, true),
            Some(TestCategory::Unit)
        );
        assert_eq!(TestCategory::from_flags(false, false, false), None);
    }

    #[test]
    fn pytest_args_without_filters_run_everything() {
        let args = TestSelection::default().pytest_args("test_bulletin_api.py");
        assert_eq!(args, vec!["test_bulletin_api.py", "-v", "--tb=short"]);
    }

    #[test]
    fn coverage_adds_instrumentation_and_package() {
        let sel = TestSelection::new(Some(TestCategory::Smoke), None, true).unwrap();
        let args = sel.pytest_args("test_bulletin_api.py");
        assert_eq!(
            &args[3..],
            &["-k", "TestSmoke", "--cov=modules", "--cov-report=term-missing"]
        );
        assert!(sel.required_packages().contains(&("pytest_cov", "pytest-cov")));
    }

    #[test]
    fn exit_codes_map_to_outcomes() {
        assert_eq!(TestOutcome::from_code(0), TestOutcome::Passed);
        assert_eq!(TestOutcome::from_code(5), TestOutcome::NoTestsCollected);
        assert_eq!(TestOutcome::from_code(1), TestOutcome::Failed(1));
        for code in [0, 1, 2, 5, 137] {
            assert_eq!(TestOutcome::from_code(code).exit_code(), code);
        }
    }
}
