use crate::types::DeployPhase;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Layout constants (relative to the install root)
// ---------------------------------------------------------------------------

pub const BACKEND_DIR: &str = "bulletin-backend";
pub const MODULES_DIR: &str = "bulletin-backend/modules";

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const APP_FILE: &str = "bulletin-backend/app.py";
pub const REQUIREMENTS_FILE: &str = "bulletin-backend/requirements.txt";
pub const TEST_FILE: &str = "test_bulletin_api.py";
pub const CONFIG_FILE: &str = "bulletin-deploy.yaml";
pub const DATABASE_FILE: &str = "bulletin-backend/data/bulletins.db";

/// Volume-mount directories, created in order.
pub const VOLUME_DIRS: &[&str] = &[
    MODULES_DIR,
    "bulletin-backend/data",
    "bulletin-backend/data/daily-office",
    "bulletin-backend/output",
    "bulletin-backend/assets",
    "bulletin-backend/templates",
    "flask-web-gui/templates",
    "postgres/data",
    "redis/data",
];

pub const HYMN_MODULE: &str = "bulletin-backend/modules/hymn_lookup.py";

pub const PHASE1_REQUIRED: &[&str] = &[
    COMPOSE_FILE,
    "bulletin-backend/Dockerfile",
    APP_FILE,
    REQUIREMENTS_FILE,
    HYMN_MODULE,
    "bulletin-backend/modules/docx_generator.py",
    "bulletin-backend/data/hymnal_1982.json",
    "flask-web-gui/Dockerfile",
    "flask-web-gui/app.py",
    "flask-web-gui/templates/index.html",
];

/// Phase 2 builds on an installed phase 1 backend. The modules directory
/// itself is provisioned in the same run, so a phase 1 module stands in for it.
pub const PHASE2_REQUIRED: &[&str] = &[APP_FILE, REQUIREMENTS_FILE, HYMN_MODULE];

/// Phase 2 modules: file name in the staging directory → destination.
pub const PHASE2_MODULES: &[(&str, &str)] = &[
    (
        "calendar_service.py",
        "bulletin-backend/modules/calendar_service.py",
    ),
    (
        "lectionary_service.py",
        "bulletin-backend/modules/lectionary_service.py",
    ),
];

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Absolute paths of one installation, derived from its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn backend_dir(&self) -> PathBuf {
        self.join(BACKEND_DIR)
    }

    pub fn app_file(&self) -> PathBuf {
        self.join(APP_FILE)
    }

    pub fn requirements_file(&self) -> PathBuf {
        self.join(REQUIREMENTS_FILE)
    }

    pub fn test_file(&self) -> PathBuf {
        self.backend_dir().join(TEST_FILE)
    }

    pub fn config_file(&self) -> PathBuf {
        self.join(CONFIG_FILE)
    }

    pub fn database_file(&self) -> PathBuf {
        self.join(DATABASE_FILE)
    }

    pub fn volume_dirs(&self) -> Vec<PathBuf> {
        VOLUME_DIRS.iter().map(|d| self.join(d)).collect()
    }

    pub fn required_files(&self, phase: DeployPhase) -> Vec<PathBuf> {
        let rel = match phase {
            DeployPhase::Base => PHASE1_REQUIRED,
            DeployPhase::Lectionary => PHASE2_REQUIRED,
        };
        rel.iter().map(|f| self.join(f)).collect()
    }

    /// Phase 2 module copies as (source, destination) pairs.
    pub fn phase2_modules(&self, staging: &Path) -> Vec<(PathBuf, PathBuf)> {
        PHASE2_MODULES
            .iter()
            .map(|(src, dest)| (staging.join(src), self.join(dest)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = Layout::new("/srv/bulletin");
        assert_eq!(
            layout.app_file(),
            PathBuf::from("/srv/bulletin/bulletin-backend/app.py")
        );
        assert_eq!(
            layout.test_file(),
            PathBuf::from("/srv/bulletin/bulletin-backend/test_bulletin_api.py")
        );
        assert_eq!(
            layout.config_file(),
            PathBuf::from("/srv/bulletin/bulletin-deploy.yaml")
        );
    }

    #[test]
    fn volume_dirs_keep_order() {
        let layout = Layout::new("/srv/bulletin");
        let dirs = layout.volume_dirs();
        assert_eq!(dirs.len(), VOLUME_DIRS.len());
        assert_eq!(dirs[0], PathBuf::from("/srv/bulletin/bulletin-backend/modules"));
        assert!(dirs.iter().all(|d| d.starts_with("/srv/bulletin")));
    }

    #[test]
    fn phase2_requires_phase1_backend() {
        let layout = Layout::new("/srv/bulletin");
        let phase1 = layout.required_files(DeployPhase::Base);
        let phase2 = layout.required_files(DeployPhase::Lectionary);
        for f in &phase2 {
            assert!(phase1.contains(f), "{} not in phase 1", f.display());
        }
        assert!(phase2.contains(&layout.join(HYMN_MODULE)));
        // provisioning creates this directory, so it can't prove an install
        assert!(!phase2.contains(&layout.join(MODULES_DIR)));
    }

    #[test]
    fn phase2_modules_land_in_modules_dir() {
        let layout = Layout::new("/srv/bulletin");
        for (src, dest) in layout.phase2_modules(Path::new("/tmp/staging")) {
            assert!(src.starts_with("/tmp/staging"));
            assert!(dest.starts_with(layout.join(MODULES_DIR)));
            assert_eq!(src.file_name(), dest.file_name());
        }
    }
}
