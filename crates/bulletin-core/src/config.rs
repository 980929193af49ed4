use crate::error::{DeployError, Result};
use crate::io;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// DeployConfig
// ---------------------------------------------------------------------------

/// Operator-tunable settings for one installation.
///
/// Every field has a default, so a missing or partial `bulletin-deploy.yaml`
/// is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Orchestrator invocation, e.g. `["docker", "compose"]`.
    pub compose_command: Vec<String>,
    /// Compose file, relative to the install root.
    pub compose_file: PathBuf,
    /// Services rebuilt by `deploy`.
    pub build_services: Vec<String>,
    /// Fixed wait after `up -d` before querying stack status.
    pub settle_delay_secs: u64,

    pub python: String,
    /// Base URL handed to the test runner as `BULLETIN_API_URL`.
    pub api_url: String,
    pub port: u16,
    pub startup_delay_secs: u64,
    pub health_attempts: u32,
    pub health_interval_secs: u64,

    /// Where Phase 2 module sources are picked up from, relative to the root.
    pub staging_dir: PathBuf,
    /// External route patcher; the app file path is appended as last
    /// argument. Unset means the built-in patcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_patcher: Option<Vec<String>>,
    pub phase2_requirements: Vec<String>,
    pub smoke_packages: Vec<String>,
    /// Installed before the single calendar check retry.
    pub calendar_remediation: Vec<String>,
}

const DEFAULT_PORT: u16 = 8002;

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            compose_command: vec!["docker".to_string(), "compose".to_string()],
            compose_file: PathBuf::from(crate::paths::COMPOSE_FILE),
            build_services: vec!["bulletin-api".to_string(), "bulletin-gui".to_string()],
            settle_delay_secs: 10,
            python: "python3".to_string(),
            api_url: format!("http://localhost:{DEFAULT_PORT}"),
            port: DEFAULT_PORT,
            startup_delay_secs: 3,
            health_attempts: 1,
            health_interval_secs: 2,
            staging_dir: PathBuf::from("."),
            route_patcher: None,
            phase2_requirements: vec![
                "liturgical-calendar".to_string(),
                "redis".to_string(),
                "httpx".to_string(),
            ],
            smoke_packages: vec![
                "fastapi".to_string(),
                "uvicorn".to_string(),
                "python-docx".to_string(),
                "pydantic".to_string(),
            ],
            calendar_remediation: vec![
                "liturgical-calendar".to_string(),
                "python-dateutil".to_string(),
            ],
        }
    }
}

impl DeployConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self =
            serde_yaml::from_str(&data).map_err(|e| DeployError::InvalidConfig {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Write the config only if `path` does not exist. Returns true if written.
    pub fn init(&self, path: &Path) -> Result<bool> {
        let data = serde_yaml::to_string(self)?;
        io::write_if_missing(path, data.as_bytes())
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |reason: &str| DeployError::InvalidConfig {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        if self.compose_command.is_empty() {
            return Err(invalid("compose_command must not be empty"));
        }
        if self.route_patcher.as_ref().is_some_and(Vec::is_empty) {
            return Err(invalid("route_patcher must not be empty"));
        }
        if self.python.trim().is_empty() {
            return Err(invalid("python must not be empty"));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
