use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("{} required file(s) missing:\n{}", .0.len(), list_paths(.0))]
    MissingFiles(Vec<PathBuf>),

    #[error("source file not found: {}\n  {hint}", .path.display())]
    MissingSource { path: PathBuf, hint: String },

    #[error("copy verification failed: {} does not exist after copy", .0.display())]
    CopyVerification(PathBuf),

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with code {code}")]
    CommandFailed {
        program: String,
        code: i32,
        output: String,
    },

    #[error("failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("health check failed for {url}: {reason}")]
    HealthCheck { url: String, reason: String },

    #[error("test file not found: {}", .0.display())]
    TestFileMissing(PathBuf),

    #[error("unknown test phase {0}: expected 1-4")]
    UnknownPhase(u8),

    #[error("invalid config {}: {reason}", .path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl DeployError {
    /// Captured output of a failed external command, if any.
    pub fn command_output(&self) -> Option<&str> {
        match self {
            DeployError::CommandFailed { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, DeployError>;
