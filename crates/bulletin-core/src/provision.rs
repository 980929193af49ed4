use crate::error::Result;
use crate::io;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirStatus {
    Created,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirReport {
    pub path: PathBuf,
    pub status: DirStatus,
}

/// Create every directory in `dirs` that does not exist yet, in order.
///
/// The first filesystem error aborts; directories created before it stay.
pub fn provision_dirs(dirs: &[PathBuf]) -> Result<Vec<DirReport>> {
    let mut reports = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let status = if io::ensure_dir(dir)? {
            tracing::info!(path = %dir.display(), "created directory");
            DirStatus::Created
        } else {
            DirStatus::Exists
        };
        reports.push(DirReport {
            path: dir.clone(),
            status,
        });
    }
    Ok(reports)
}
