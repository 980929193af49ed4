use bulletin_core::paths::{COMPOSE_FILE, CONFIG_FILE};
use std::path::{Path, PathBuf};

/// Resolve the install root.
///
/// Priority:
/// 1. `--root` flag / `BULLETIN_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `bulletin-deploy.yaml`
/// 3. Walk upward from `cwd` looking for `docker-compose.yml`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, CONFIG_FILE)
        .or_else(|| find_upward(&cwd, COMPOSE_FILE))
        .unwrap_or(cwd)
}

/// Nearest ancestor of `start` (inclusive) containing the file `marker`.
fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_file())
        .map(Path::to_path_buf)
}
