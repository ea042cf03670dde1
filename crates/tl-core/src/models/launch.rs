use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::service::Lifetime;

/// Lifecycle state of one service during a launch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Pending,
    Starting,
    Ready,
    Failed,
    /// A `waitFor` dependency failed; the service was never started.
    SkippedDueToDependencyFailure,
    /// The launch was cancelled before the service settled.
    Cancelled,
}

impl RunState {
    /// Whether the launcher has finished with this service.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Ready
                | RunState::Failed
                | RunState::SkippedDueToDependencyFailure
                | RunState::Cancelled
        )
    }

    /// Transitions only move forward, except `Ready -> Failed` on a crash.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Pending, Starting | SkippedDueToDependencyFailure | Cancelled) => true,
            (Starting, Ready | Failed | Cancelled) => true,
            (Ready, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Pending => "Pending",
            RunState::Starting => "Starting",
            RunState::Ready => "Ready",
            RunState::Failed => "Failed",
            RunState::SkippedDueToDependencyFailure => "SkippedDueToDependencyFailure",
            RunState::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// Current state of one service plus the reason it ended up there.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
}

impl Default for ServiceStatus {
    fn default() -> Self {
        Self {
            state: RunState::Pending,
            reason: None,
            started_at: None,
            ready_at: None,
        }
    }
}

/// Opaque reference to a container started by a runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ContainerHandle {
    pub service: String,
    pub id: String,
    pub lifetime: Lifetime,
}

/// One line of container output.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub service: String,
    pub line: String,
    pub is_stderr: bool,
}

/// Progress notifications emitted while launching.
#[derive(Debug, Clone)]
pub enum LaunchEvent {
    StateChanged {
        service: String,
        state: RunState,
        reason: Option<String>,
    },
    /// The runtime accepted the start request.
    ContainerStarted { handle: ContainerHandle },
    /// The runtime stopped a container.
    ContainerStopped { service: String },
}

/// Terminal state of every service after a launch, in topological order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchReport {
    pub services: IndexMap<String, ServiceStatus>,
}

impl LaunchReport {
    pub fn state(&self, service: &str) -> Option<RunState> {
        self.services.get(service).map(|s| s.state)
    }

    pub fn count(&self, state: RunState) -> usize {
        self.services.values().filter(|s| s.state == state).count()
    }

    /// A launch succeeds when at least one service is Ready, or when there
    /// was nothing to launch.
    pub fn is_success(&self) -> bool {
        self.services.is_empty() || self.count(RunState::Ready) > 0
    }
}
