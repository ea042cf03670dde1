use std::path::{Path, PathBuf};

use crate::error::{LauncherError, Result};
use crate::models::TopologySpec;
use crate::services::topology::{self, Topology};

pub const TOPOLOGY_FILENAME: &str = "topology.yaml";

/// Parse a topology file without validating it.
pub fn load(path: &Path) -> Result<TopologySpec> {
    if !path.exists() {
        return Err(LauncherError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    let spec: TopologySpec = serde_yaml::from_str(&contents)
        .map_err(|e| LauncherError::InvalidConfig(format!("{}: {e}", path.display())))?;
    Ok(spec)
}

/// Parse and compile a topology file. Relative mount sources resolve
/// against the file's directory.
pub fn load_topology(path: &Path) -> Result<Topology> {
    let spec = load(path)?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base_dir = std::path::absolute(&base_dir).unwrap_or(base_dir);
    topology::compile(&spec, &base_dir)
}

/// Walk up from `start` looking for `topology.yaml`.
pub fn find_topology_file(start: &Path) -> Result<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(TOPOLOGY_FILENAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        dir = current.parent();
    }
    Err(LauncherError::ConfigNotFound(start.join(TOPOLOGY_FILENAME)))
}
