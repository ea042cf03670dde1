pub mod config;
pub mod launch;
pub mod service;
pub mod topology;

pub use config::LauncherConfig;
pub use launch::{ContainerHandle, LaunchEvent, LaunchReport, LogLine, RunState, ServiceStatus};
pub use service::{BindMount, Endpoint, EndpointScheme, Lifetime, ServiceDefinition};
pub use topology::{DependencyEdge, EdgeKind, ServiceSpec, TopologySpec};
