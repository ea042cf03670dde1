use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{LauncherError, Result};
use crate::models::{BindMount, Endpoint, Lifetime, ServiceDefinition, ServiceSpec};

/// Containers reach each other by service name, so names must be DNS labels.
static SERVICE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap());

static ENV_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validating builder for [`ServiceDefinition`].
#[derive(Debug, Clone)]
pub struct ServiceDefinitionBuilder {
    name: String,
    image: String,
    endpoints: Vec<Endpoint>,
    env: IndexMap<String, String>,
    mounts: Vec<BindMount>,
    args: Vec<String>,
    lifetime: Lifetime,
    readiness_timeout: Option<Duration>,
    health_cmd: Option<String>,
}

impl ServiceDefinitionBuilder {
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            endpoints: Vec::new(),
            env: IndexMap::new(),
            mounts: Vec::new(),
            args: Vec::new(),
            lifetime: Lifetime::default(),
            readiness_timeout: None,
            health_cmd: None,
        }
    }

    /// Start from a topology file entry. Relative mount sources are resolved
    /// against `base_dir`.
    pub fn from_spec(spec: &ServiceSpec, base_dir: &Path) -> Self {
        let mounts = spec
            .mounts
            .iter()
            .map(|m| {
                let source = if m.source.is_absolute() {
                    m.source.clone()
                } else {
                    base_dir.join(&m.source)
                };
                BindMount {
                    source,
                    ..m.clone()
                }
            })
            .collect();

        Self {
            name: spec.name.clone(),
            image: spec.image_reference(),
            endpoints: spec.endpoints.clone(),
            env: spec.env.clone(),
            mounts,
            args: spec.args.clone(),
            lifetime: spec.lifetime,
            readiness_timeout: spec.readiness_timeout_secs.map(Duration::from_secs),
            health_cmd: spec.health_cmd.clone(),
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn mount(mut self, mount: BindMount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = Some(timeout);
        self
    }

    pub fn health_cmd(mut self, cmd: &str) -> Self {
        self.health_cmd = Some(cmd.to_string());
        self
    }

    /// Collect every problem with the definition.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !SERVICE_NAME_RE.is_match(&self.name) {
            errors.push(format!(
                "service name '{}' must be a lowercase DNS label",
                self.name
            ));
        }

        if self.image.trim().is_empty() {
            errors.push(format!("service '{}' has no image", self.name));
        }

        let mut endpoint_names = HashSet::new();
        for endpoint in &self.endpoints {
            if !endpoint_names.insert(endpoint.name.as_str()) {
                errors.push(format!(
                    "service '{}' declares endpoint '{}' more than once",
                    self.name, endpoint.name
                ));
            }
            if endpoint.port == 0 || endpoint.target_port == 0 {
                errors.push(format!(
                    "service '{}' endpoint '{}' has a zero port",
                    self.name, endpoint.name
                ));
            }
        }

        for key in self.env.keys() {
            if !ENV_NAME_RE.is_match(key) {
                errors.push(format!(
                    "service '{}' has invalid environment variable name '{key}'",
                    self.name
                ));
            }
        }

        for mount in &self.mounts {
            if !mount.target.starts_with('/') {
                errors.push(format!(
                    "service '{}' mount target '{}' must be absolute",
                    self.name, mount.target
                ));
            }
            if !is_creatable(&mount.source) {
                errors.push(format!(
                    "service '{}' mount source {} does not exist and cannot be created",
                    self.name,
                    mount.source.display()
                ));
            }
        }

        if self.health_cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
            errors.push(format!("service '{}' has an empty health_cmd", self.name));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn build(self) -> Result<ServiceDefinition> {
        if let Err(errors) = self.validate() {
            return Err(LauncherError::InvalidDefinition(errors.join("; ")));
        }

        Ok(ServiceDefinition {
            name: self.name,
            image: self.image,
            endpoints: self.endpoints,
            env: self.env,
            mounts: self.mounts,
            args: self.args,
            lifetime: self.lifetime,
            readiness_timeout: self.readiness_timeout,
            health_cmd: self.health_cmd,
        })
    }
}

/// A path exists, or its nearest existing ancestor is a writable directory.
fn is_creatable(path: &Path) -> bool {
    if path.exists() {
        return true;
    }
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        if let Ok(metadata) = std::fs::metadata(ancestor) {
            return metadata.is_dir() && !metadata.permissions().readonly();
        }
    }
    false
}
