//! Container runtime collaborator: the trait the launcher drives and its
//! implementation over the `docker` CLI.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex, OnceCell};

use crate::error::{LauncherError, Result};
use crate::models::{ContainerHandle, EndpointScheme, Lifetime, LogLine, ServiceDefinition};

const LABEL_SERVICE: &str = "topology-launcher.service";
const LABEL_FINGERPRINT: &str = "topology-launcher.fingerprint";

/// Starts, stops and probes containers on behalf of the launcher.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn start(&self, definition: &ServiceDefinition) -> Result<ContainerHandle>;

    async fn stop(&self, handle: &ContainerHandle) -> Result<()>;

    /// Whether the container is accepting work. Errors count as not ready.
    async fn is_ready(&self, handle: &ContainerHandle) -> Result<bool>;
}

async fn run_docker(args: &[String]) -> Result<String> {
    let output = Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| LauncherError::Runtime(format!("failed to run docker: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LauncherError::Runtime(format!(
            "docker {} failed (exit {}): {}",
            args.first().map(String::as_str).unwrap_or(""),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// An existing container found by name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExistingContainer {
    id: String,
    running: bool,
    fingerprint: String,
}

/// Parse one `docker ps --format '{{.ID}}|{{.State}}|{{.Label ..}}'` line.
fn parse_ps_line(line: &str) -> Option<ExistingContainer> {
    let mut parts = line.trim().splitn(3, '|');
    let id = parts.next().filter(|s| !s.is_empty())?;
    let state = parts.next().unwrap_or("");
    let fingerprint = parts.next().unwrap_or("");
    Some(ExistingContainer {
        id: id.to_string(),
        running: state == "running",
        fingerprint: fingerprint.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    state: InspectState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

/// Running, and healthy if the image declares a healthcheck.
fn inspect_reports_ready(json: &str) -> Result<bool> {
    let entries: Vec<InspectEntry> = serde_json::from_str(json)?;
    let Some(entry) = entries.first() else {
        return Ok(false);
    };
    let healthy = entry
        .state
        .health
        .as_ref()
        .map(|h| h.status == "healthy")
        .unwrap_or(true);
    Ok(entry.state.running && healthy)
}

/// Arguments after `docker run`, excluding the fingerprint label.
fn container_args(definition: &ServiceDefinition, network: &str) -> Vec<String> {
    let name = definition.name();
    let mut args = owned(&["-d", "--name", name, "--network", network]);
    args.extend(owned(&["--network-alias", name]));
    args.push("--label".into());
    args.push(format!("{LABEL_SERVICE}={name}"));

    for endpoint in definition.endpoints() {
        args.push("-p".into());
        args.push(format!("{}:{}", endpoint.port, endpoint.target_port));
    }
    for (key, value) in definition.env() {
        args.push("-e".into());
        args.push(format!("{key}={value}"));
    }
    for mount in definition.mounts() {
        args.push("-v".into());
        args.push(mount.volume_arg());
    }
    if let Some(cmd) = definition.health_cmd() {
        args.extend(owned(&["--health-cmd", cmd, "--health-interval", "2s"]));
    }

    args.push(definition.image().to_string());
    args.extend(definition.args().iter().cloned());
    args
}

/// Digest of the run arguments, stored as a label so a persistent container
/// can be matched against its definition on the next launch.
fn fingerprint(args: &[String]) -> String {
    let mut hasher = Sha256::new();
    for arg in args {
        hasher.update(arg.as_bytes());
        hasher.update([0u8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Full `docker run` argument list for a definition.
pub fn run_args(definition: &ServiceDefinition, network: &str) -> Vec<String> {
    let args = container_args(definition, network);
    let mut full = vec!["run".to_string()];
    full.push("--label".into());
    full.push(format!("{LABEL_FINGERPRINT}={}", fingerprint(&args)));
    full.extend(args);
    full
}

/// [`ContainerRuntime`] over the `docker` CLI. All containers join one
/// user-defined network so services resolve each other by name.
pub struct DockerRuntime {
    network: String,
    probe_host: String,
    probe_timeout: Duration,
    network_ready: OnceCell<()>,
    http: reqwest::Client,
    /// Published host ports per container id, for readiness probes.
    published: Mutex<HashMap<String, Vec<(u16, EndpointScheme)>>>,
}

impl DockerRuntime {
    pub fn new(network: &str) -> Self {
        let probe_timeout = Duration::from_secs(1);
        let http = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .unwrap_or_default();
        Self {
            network: network.to_string(),
            probe_host: "127.0.0.1".to_string(),
            probe_timeout,
            network_ready: OnceCell::new(),
            http,
            published: Mutex::new(HashMap::new()),
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    async fn ensure_network(&self) -> Result<()> {
        self.network_ready
            .get_or_try_init(|| async {
                let inspect = owned(&["network", "inspect", &self.network]);
                if run_docker(&inspect).await.is_err() {
                    tracing::info!(network = %self.network, "creating container network");
                    run_docker(&owned(&["network", "create", &self.network])).await?;
                }
                Ok::<(), LauncherError>(())
            })
            .await?;
        Ok(())
    }

    async fn find_container(&self, name: &str) -> Result<Option<ExistingContainer>> {
        let filter = format!("name=^/{name}$");
        let format = format!("{{{{.ID}}}}|{{{{.State}}}}|{{{{.Label \"{LABEL_FINGERPRINT}\"}}}}");
        let output = run_docker(&owned(&["ps", "-a", "--filter", &filter, "--format", &format])).await?;
        Ok(output.lines().find_map(parse_ps_line))
    }

    /// One published endpoint answers. HTTP endpoints must return a
    /// response, since the userland proxy accepts TCP connections before
    /// the container listens.
    async fn probe(&self, port: u16, scheme: EndpointScheme) -> bool {
        match scheme {
            EndpointScheme::Http => {
                let url = format!("http://{}:{port}/", self.probe_host);
                self.http.get(url).send().await.is_ok()
            }
            EndpointScheme::Tcp => {
                let connect = TcpStream::connect((self.probe_host.as_str(), port));
                matches!(
                    tokio::time::timeout(self.probe_timeout, connect).await,
                    Ok(Ok(_))
                )
            }
        }
    }

    async fn create_mount_sources(&self, definition: &ServiceDefinition) -> Result<()> {
        for source in definition.missing_mount_sources() {
            tracing::debug!(service = %definition.name(), path = %source.display(), "creating mount source");
            tokio::fs::create_dir_all(source).await?;
        }
        Ok(())
    }

    /// Stream `docker logs -f` for a container into `tx` until the container
    /// exits, the receiver closes, or the returned task is aborted.
    pub fn follow_logs(
        &self,
        handle: &ContainerHandle,
        tx: mpsc::UnboundedSender<LogLine>,
    ) -> tokio::task::JoinHandle<()> {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut cmd = Command::new("docker");
            cmd.args(["logs", "-f", "--tail", "200", handle.id.as_str()]);
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    tracing::warn!(service = %handle.service, error = %e, "failed to follow logs");
                    return;
                }
            };

            let mut readers = Vec::new();
            if let Some(stdout) = child.stdout.take() {
                readers.push(forward_lines(stdout, handle.service.clone(), false, tx.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                readers.push(forward_lines(stderr, handle.service.clone(), true, tx));
            }
            for reader in readers {
                let _ = reader.await;
            }
            let _ = child.wait().await;
        })
    }
}

fn forward_lines<R>(
    stream: R,
    service: String,
    is_stderr: bool,
    tx: mpsc::UnboundedSender<LogLine>,
) -> tokio::task::JoinHandle<()>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let sent = tx.send(LogLine {
                service: service.clone(),
                line,
                is_stderr,
            });
            if sent.is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn start(&self, definition: &ServiceDefinition) -> Result<ContainerHandle> {
        self.ensure_network().await?;
        self.create_mount_sources(definition).await?;

        let name = definition.name();
        let args = run_args(definition, &self.network);
        let wanted = fingerprint(&container_args(definition, &self.network));

        for endpoint in definition.endpoints().iter().filter(|e| e.proxied) {
            tracing::debug!(service = %name, endpoint = %endpoint.name, "proxied endpoint published directly");
        }

        let mut reused = None;
        if let Some(existing) = self.find_container(name).await? {
            let reusable =
                definition.lifetime() == Lifetime::Persistent && existing.fingerprint == wanted;
            if reusable {
                if !existing.running {
                    tracing::info!(service = %name, "starting existing persistent container");
                    run_docker(&owned(&["start", &existing.id])).await?;
                } else {
                    tracing::info!(service = %name, "reusing running persistent container");
                }
                reused = Some(existing.id);
            } else {
                tracing::info!(service = %name, "replacing stale container");
                run_docker(&owned(&["rm", "-f", &existing.id])).await?;
            }
        }

        let id = match reused {
            Some(id) => id,
            None => {
                tracing::info!(service = %name, image = %definition.image(), "docker run");
                run_docker(&args).await?
            }
        };

        let ports = definition
            .endpoints()
            .iter()
            .map(|e| (e.port, e.scheme))
            .collect();
        self.published.lock().await.insert(id.clone(), ports);

        Ok(ContainerHandle {
            service: name.to_string(),
            id,
            lifetime: definition.lifetime(),
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<()> {
        match handle.lifetime {
            Lifetime::Persistent => {
                run_docker(&owned(&["stop", &handle.id])).await?;
            }
            Lifetime::Ephemeral => {
                run_docker(&owned(&["rm", "-f", &handle.id])).await?;
                self.published.lock().await.remove(&handle.id);
            }
        }
        Ok(())
    }

    async fn is_ready(&self, handle: &ContainerHandle) -> Result<bool> {
        let json = run_docker(&owned(&["inspect", &handle.id])).await?;
        if !inspect_reports_ready(&json)? {
            return Ok(false);
        }

        let ports = self
            .published
            .lock()
            .await
            .get(&handle.id)
            .cloned()
            .unwrap_or_default();
        for (port, scheme) in ports {
            if !self.probe(port, scheme).await {
                tracing::debug!(service = %handle.service, port, "endpoint not answering yet");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
