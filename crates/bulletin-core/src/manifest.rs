use crate::error::{DeployError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    pub path: PathBuf,
    pub present: bool,
}

/// Presence of every required path, in the order given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestReport {
    pub checks: Vec<FileCheck>,
}

impl ManifestReport {
    pub fn missing(&self) -> Vec<&Path> {
        self.checks
            .iter()
            .filter(|c| !c.present)
            .map(|c| c.path.as_path())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.checks.iter().all(|c| c.present)
    }

    /// `Err(MissingFiles)` carrying exactly the missing subset.
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            return Ok(self);
        }
        let missing = self.missing().into_iter().map(Path::to_path_buf).collect();
        Err(DeployError::MissingFiles(missing))
    }
}

/// Check every path; never stops at the first miss.
pub fn verify(paths: &[PathBuf]) -> ManifestReport {
    let checks = paths
        .iter()
        .map(|p| {
            let present = p.exists();
            if !present {
                tracing::warn!(path = %p.display(), "required file missing");
            }
            FileCheck {
                path: p.clone(),
                present,
            }
        })
        .collect();
    ManifestReport { checks }
}
