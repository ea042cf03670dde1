use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Whether a service's container outlives the launcher.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// Removed when the launcher stops it.
    #[default]
    Ephemeral,
    /// Kept across launcher restarts; stopped but never removed.
    Persistent,
}

impl Lifetime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifetime::Ephemeral => "ephemeral",
            Lifetime::Persistent => "persistent",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EndpointScheme {
    #[default]
    Tcp,
    Http,
}

impl EndpointScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointScheme::Tcp => "tcp",
            EndpointScheme::Http => "http",
        }
    }
}

/// A network endpoint published on the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    /// Host port.
    pub port: u16,
    /// Container port.
    pub target_port: u16,
    #[serde(default)]
    pub scheme: EndpointScheme,
    #[serde(default)]
    pub proxied: bool,
    /// Label shown next to the endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
}

impl Endpoint {
    pub fn tcp(name: &str, port: u16, target_port: u16) -> Self {
        Self {
            name: name.to_string(),
            port,
            target_port,
            scheme: EndpointScheme::Tcp,
            proxied: false,
            display_text: None,
        }
    }

    pub fn http(name: &str, port: u16, target_port: u16) -> Self {
        Self {
            scheme: EndpointScheme::Http,
            ..Self::tcp(name, port, target_port)
        }
    }

    pub fn with_display_text(mut self, text: &str) -> Self {
        self.display_text = Some(text.to_string());
        self
    }

    /// Host-reachable URL for this endpoint, e.g. `http://localhost:8081`.
    pub fn url(&self, host: &str) -> String {
        format!("{}://{host}:{}", self.scheme.as_str(), self.port)
    }

    /// Label for display: the configured text, else the endpoint name.
    pub fn label(&self) -> &str {
        self.display_text.as_deref().unwrap_or(&self.name)
    }
}

/// A host path mounted into the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

impl BindMount {
    pub fn new(source: impl Into<PathBuf>, target: &str, read_only: bool) -> Self {
        Self {
            source: source.into(),
            target: target.to_string(),
            read_only,
        }
    }

    /// Docker `-v` argument: `source:target[:ro]`.
    pub fn volume_arg(&self) -> String {
        let mut arg = format!("{}:{}", self.source.display(), self.target);
        if self.read_only {
            arg.push_str(":ro");
        }
        arg
    }
}

/// Static description of one deployable container.
///
/// Built only through [`crate::services::definition::ServiceDefinitionBuilder`],
/// which validates it; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub(crate) name: String,
    pub(crate) image: String,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) env: IndexMap<String, String>,
    pub(crate) mounts: Vec<BindMount>,
    pub(crate) args: Vec<String>,
    pub(crate) lifetime: Lifetime,
    pub(crate) readiness_timeout: Option<Duration>,
    pub(crate) health_cmd: Option<String>,
}

impl ServiceDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn env(&self) -> &IndexMap<String, String> {
        &self.env
    }

    pub fn mounts(&self) -> &[BindMount] {
        &self.mounts
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout
    }

    pub fn health_cmd(&self) -> Option<&str> {
        self.health_cmd.as_deref()
    }

    /// `(label, url)` pairs for every published endpoint.
    pub fn endpoint_urls(&self, host: &str) -> Vec<(String, String)> {
        self.endpoints
            .iter()
            .map(|e| (e.label().to_string(), e.url(host)))
            .collect()
    }

    /// Mount sources that do not exist yet and must be created before start.
    pub fn missing_mount_sources(&self) -> Vec<&Path> {
        self.mounts
            .iter()
            .map(|m| m.source.as_path())
            .filter(|p| !p.exists())
            .collect()
    }
}
