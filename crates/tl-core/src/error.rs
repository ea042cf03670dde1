use std::path::PathBuf;
use std::time::Duration;

use crate::models::{LaunchReport, RunState};

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("unknown service '{service}' referenced by '{referenced_by}'")]
    UnknownService {
        service: String,
        referenced_by: String,
    },

    #[error("invalid service definition: {0}")]
    InvalidDefinition(String),

    #[error("service '{service}' was not ready within {}s", .timeout.as_secs())]
    ReadinessTimeout { service: String, timeout: Duration },

    #[error(
        "no service reached Ready ({} failed, {} skipped, {} cancelled)",
        .0.count(RunState::Failed),
        .0.count(RunState::SkippedDueToDependencyFailure),
        .0.count(RunState::Cancelled)
    )]
    NoServiceReady(LaunchReport),

    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    #[error("topology file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid topology: {0}")]
    InvalidConfig(String),

    #[error("container runtime failed: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, LauncherError>;
