//! Phase 2 dependency patching: module copy, requirements append and the
//! external route-table patch. Each step fails fast.

use crate::error::{DeployError, Result};
use crate::io;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Module copy
// ---------------------------------------------------------------------------

/// Copy each `(source, destination)` pair, overwriting destinations, then
/// re-verify every destination exists.
pub fn copy_modules(copies: &[(PathBuf, PathBuf)]) -> Result<()> {
    for (source, dest) in copies {
        if !source.is_file() {
            return Err(DeployError::MissingSource {
                path: source.clone(),
                hint: format!(
                    "place {} in the staging directory before running phase 2",
                    source
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                ),
            });
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, dest)?;
        tracing::info!(source = %source.display(), dest = %dest.display(), "copied module");
    }

    for (_, dest) in copies {
        if !dest.is_file() {
            return Err(DeployError::CopyVerification(dest.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Requirements append
// ---------------------------------------------------------------------------

/// Names from `wanted` that do not occur anywhere in `existing`.
///
/// Matching is by raw substring, so a pinned `redis==5.0.1` line satisfies
/// `redis`, and so does an unrelated `hiredis` line.
pub fn missing_requirements<'a>(existing: &str, wanted: &'a [String]) -> Vec<&'a str> {
    wanted
        .iter()
        .map(String::as_str)
        .filter(|name| !existing.contains(name))
        .collect()
}

/// Append the missing names to the requirements file. Returns what was appended.
pub fn append_requirements(path: &Path, wanted: &[String]) -> Result<Vec<String>> {
    let existing = std::fs::read_to_string(path)?;
    let missing = missing_requirements(&existing, wanted);
    io::append_lines(path, &existing, &missing)?;
    if !missing.is_empty() {
        tracing::info!(path = %path.display(), added = ?missing, "requirements updated");
    }
    Ok(missing.into_iter().map(str::to_string).collect())
}

// ---------------------------------------------------------------------------
// Route patch
// ---------------------------------------------------------------------------

/// Run the route patcher with `app_file` appended as its last argument.
pub fn patch_routes(
    runner: &dyn CommandRunner,
    patcher: &[String],
    app_file: &Path,
    cwd: &Path,
) -> Result<CommandOutput> {
    let spec = CommandSpec::from_argv(patcher)
        .arg(app_file.to_string_lossy())
        .current_dir(cwd);
    runner.run(&spec)?.check(&spec.program)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
