pub mod config;
pub mod db;
pub mod deploy;
pub mod patch;

use anyhow::Context;
use bulletin_core::config::DeployConfig;
use std::path::Path;

pub(crate) fn load_config(path: &Path) -> anyhow::Result<DeployConfig> {
    DeployConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// `path` relative to `root` when it lies inside it.
pub(crate) fn rel<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
