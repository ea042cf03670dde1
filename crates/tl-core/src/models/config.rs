use std::time::Duration;

/// Tuning for [`crate::services::launcher::TopologyLauncher`].
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// How long a started service may take to report Ready, unless its
    /// definition overrides it.
    pub readiness_timeout: Duration,
    /// Delay between readiness probes.
    pub poll_interval: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}
