use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use indexmap::IndexMap;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{LauncherError, Result};
use crate::models::{
    ContainerHandle, EdgeKind, LaunchEvent, LaunchReport, LauncherConfig, RunState,
    ServiceDefinition, ServiceStatus,
};
use crate::services::graph::DependencyGraph;
use crate::services::runtime::ContainerRuntime;
use crate::services::topology::Topology;

/// Terminal state published by each service task to its `waitFor` dependents.
type Completion = Option<RunState>;

/// Starts a topology in dependency order and tracks each service's RunState.
///
/// Cheap to clone: every clone shares the same runtime, state map and
/// cancellation token.
///
/// A launch takes the current token when it begins. Once a cancelled launch
/// has finished, the launcher installs a fresh token so later launches run
/// normally.
#[derive(Clone)]
pub struct TopologyLauncher {
    runtime: Arc<dyn ContainerRuntime>,
    config: LauncherConfig,
    events: Option<mpsc::UnboundedSender<LaunchEvent>>,
    cancel: Arc<Mutex<CancellationToken>>,
    states: Arc<RwLock<IndexMap<String, ServiceStatus>>>,
    /// Containers started during the current launch, by service name.
    handles: Arc<RwLock<HashMap<String, ContainerHandle>>>,
    graph: Arc<RwLock<DependencyGraph>>,
    order: Arc<RwLock<Vec<String>>>,
}

impl TopologyLauncher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: LauncherConfig) -> Self {
        Self {
            runtime,
            config,
            events: None,
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            states: Arc::new(RwLock::new(IndexMap::new())),
            handles: Arc::new(RwLock::new(HashMap::new())),
            graph: Arc::new(RwLock::new(DependencyGraph::new())),
            order: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Send progress events to `tx` while launching and stopping.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<LaunchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Token that cancels the in-flight launch, or the next one if none is
    /// running. Cancelling stops every service already started, in reverse
    /// dependency order.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reset_cancel_token(&self) {
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
    }

    /// Launch a compiled topology.
    pub async fn launch_topology(&self, topology: &Topology) -> Result<LaunchReport> {
        self.launch(topology.definitions(), topology.graph()).await
    }

    /// Start every service once its `waitFor` dependencies are Ready.
    ///
    /// Ordering errors abort before anything is started. Runtime failures
    /// only affect the failing service and its transitive `waitFor`
    /// dependents. Fails with [`LauncherError::NoServiceReady`] when there
    /// was at least one service and none reached Ready.
    pub async fn launch<'a>(
        &self,
        definitions: impl IntoIterator<Item = &'a ServiceDefinition>,
        graph: &DependencyGraph,
    ) -> Result<LaunchReport> {
        let definitions: IndexMap<String, ServiceDefinition> = definitions
            .into_iter()
            .map(|d| (d.name().to_string(), d.clone()))
            .collect();

        let mut graph = graph.clone();
        for name in definitions.keys() {
            graph.add_service(name);
        }
        let order = graph.topological_order()?;
        if let Some(missing) = order.iter().find(|n| !definitions.contains_key(n.as_str())) {
            return Err(LauncherError::ServiceNotFound(missing.clone()));
        }

        tracing::info!(services = order.len(), order = ?order, "launching topology");
        let cancel = self.cancel_token();

        {
            let mut states = self.states.write().await;
            states.clear();
            for name in &order {
                states.insert(name.clone(), ServiceStatus::default());
            }
        }
        self.handles.write().await.clear();
        *self.order.write().await = order.clone();
        *self.graph.write().await = graph.clone();

        let mut senders: HashMap<String, watch::Sender<Completion>> = HashMap::new();
        let mut receivers: HashMap<String, watch::Receiver<Completion>> = HashMap::new();
        for name in &order {
            let (tx, rx) = watch::channel(None);
            senders.insert(name.clone(), tx);
            receivers.insert(name.clone(), rx);
        }

        let mut tasks = Vec::with_capacity(order.len());
        for name in &order {
            let Some(definition) = definitions.get(name).cloned() else {
                continue;
            };
            let Some(done) = senders.remove(name) else {
                continue;
            };
            let waits: Vec<(String, watch::Receiver<Completion>)> = graph
                .dependencies(name, EdgeKind::WaitFor)
                .into_iter()
                .filter_map(|dep| receivers.get(dep).map(|rx| (dep.to_string(), rx.clone())))
                .collect();

            let launcher = self.clone();
            let cancel = cancel.clone();
            tasks.push((
                name.clone(),
                tokio::spawn(async move {
                    launcher.run_service(definition, waits, done, cancel).await
                }),
            ));
        }

        for (name, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(service = %name, error = %e, "service task panicked");
            }
        }

        if cancel.is_cancelled() {
            tracing::info!("launch cancelled, stopping started services");
            if let Err(e) = self.shutdown().await {
                tracing::warn!(error = %e, "shutdown after cancel incomplete");
            }
            self.reset_cancel_token();
        }

        let report = self.snapshot().await;
        tracing::info!(
            ready = report.count(RunState::Ready),
            failed = report.count(RunState::Failed),
            skipped = report.count(RunState::SkippedDueToDependencyFailure),
            cancelled = report.count(RunState::Cancelled),
            "launch finished"
        );

        if report.is_success() {
            Ok(report)
        } else {
            Err(LauncherError::NoServiceReady(report))
        }
    }

    /// Drive one service from Pending to a terminal state. Always publishes
    /// the outcome on `done` so dependents never wait forever.
    async fn run_service(
        &self,
        definition: ServiceDefinition,
        waits: Vec<(String, watch::Receiver<Completion>)>,
        done: watch::Sender<Completion>,
        cancel: CancellationToken,
    ) {
        let name = definition.name().to_string();
        let outcome = self.drive(&definition, waits, &cancel).await;
        let _ = done.send(Some(outcome));
        tracing::debug!(service = %name, state = %outcome, "service settled");
    }

    async fn drive(
        &self,
        definition: &ServiceDefinition,
        waits: Vec<(String, watch::Receiver<Completion>)>,
        cancel: &CancellationToken,
    ) -> RunState {
        let name = definition.name();

        if let Some((dependency, settled)) = Self::first_unready(waits, cancel).await {
            if settled == Some(RunState::Cancelled) {
                return self.set_state(name, RunState::Cancelled, None).await;
            }
            let reason = format!("dependency '{dependency}' did not become ready");
            return self
                .set_state(name, RunState::SkippedDueToDependencyFailure, Some(reason))
                .await;
        }

        if cancel.is_cancelled() {
            return self.set_state(name, RunState::Cancelled, None).await;
        }

        self.set_state(name, RunState::Starting, None).await;
        let handle = match self.runtime.start(definition).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(service = %name, error = %e, "start failed");
                return self
                    .set_state(name, RunState::Failed, Some(e.to_string()))
                    .await;
            }
        };
        self.handles
            .write()
            .await
            .insert(name.to_string(), handle.clone());
        self.emit(LaunchEvent::ContainerStarted {
            handle: handle.clone(),
        });

        let timeout = definition
            .readiness_timeout()
            .unwrap_or(self.config.readiness_timeout);
        let became_ready = tokio::select! {
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, self.wait_until_ready(&handle)) => Some(result.is_ok()),
        };

        match became_ready {
            Some(true) => self.set_state(name, RunState::Ready, None).await,
            Some(false) => {
                let reason = LauncherError::ReadinessTimeout {
                    service: name.to_string(),
                    timeout,
                };
                tracing::warn!(service = %name, timeout_secs = timeout.as_secs(), "readiness timed out");
                self.set_state(name, RunState::Failed, Some(reason.to_string()))
                    .await
            }
            None => self.set_state(name, RunState::Cancelled, None).await,
        }
    }

    /// Wait on every `waitFor` dependency at once. Returns the first one to
    /// settle in a state other than Ready, or `None` once all are Ready.
    /// Cancellation reports as a dependency that settled `Cancelled`.
    async fn first_unready(
        waits: Vec<(String, watch::Receiver<Completion>)>,
        cancel: &CancellationToken,
    ) -> Option<(String, Completion)> {
        let mut pending = JoinSet::new();
        for (dependency, mut rx) in waits {
            pending.spawn(async move {
                let settled = rx.wait_for(Option::is_some).await.ok().and_then(|s| *s);
                (dependency, settled)
            });
        }

        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    return Some((String::new(), Some(RunState::Cancelled)));
                }
                joined = pending.join_next() => joined,
            };
            match joined {
                None => return None,
                Some(Ok((_, Some(RunState::Ready)))) => {}
                Some(Ok((dependency, settled))) => return Some((dependency, settled)),
                Some(Err(e)) => {
                    tracing::error!(error = %e, "dependency watcher panicked");
                    return Some(("<unknown>".to_string(), None));
                }
            }
        }
    }

    async fn wait_until_ready(&self, handle: &ContainerHandle) {
        loop {
            match self.runtime.is_ready(handle).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(service = %handle.service, error = %e, "readiness probe failed");
                }
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval.max(Duration::from_millis(1))
    }

    /// Record a transition for `name` and emit it. Returns the state the
    /// service is in afterwards.
    async fn set_state(&self, name: &str, next: RunState, reason: Option<String>) -> RunState {
        let mut states = self.states.write().await;
        let Some(status) = states.get_mut(name) else {
            return next;
        };
        if !status.state.can_transition_to(next) {
            tracing::warn!(service = %name, from = %status.state, to = %next, "ignoring invalid transition");
            return status.state;
        }

        status.state = next;
        status.reason = reason.clone();
        match next {
            RunState::Starting => status.started_at = Some(Utc::now()),
            RunState::Ready => status.ready_at = Some(Utc::now()),
            _ => {}
        }
        drop(states);

        tracing::info!(service = %name, state = %next, reason = reason.as_deref().unwrap_or(""), "state changed");
        self.emit(LaunchEvent::StateChanged {
            service: name.to_string(),
            state: next,
            reason,
        });
        next
    }

    fn emit(&self, event: LaunchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Consistent copy of every service's status, in launch order.
    pub async fn snapshot(&self) -> LaunchReport {
        LaunchReport {
            services: self.states.read().await.clone(),
        }
    }

    /// Stop `name` together with everything grouped under it, deepest
    /// children first. Returns the services actually stopped.
    pub async fn stop_service(&self, name: &str) -> Result<Vec<String>> {
        let descendants = {
            let graph = self.graph.read().await;
            if !graph.contains(name) {
                return Err(LauncherError::ServiceNotFound(name.to_string()));
            }
            graph.transitive_dependents(name, EdgeKind::ParentOf)
        };

        let mut stopped = Vec::new();
        for child in descendants.iter().rev() {
            match self.stop_one(child).await {
                Ok(true) => stopped.push(child.clone()),
                Ok(false) => {}
                Err(e) => tracing::warn!(service = %child, error = %e, "failed to stop child"),
            }
        }
        if self.stop_one(name).await? {
            stopped.push(name.to_string());
        }
        Ok(stopped)
    }

    /// Stop every started service in reverse topological order. Keeps going
    /// past failures and returns the first one.
    pub async fn shutdown(&self) -> Result<()> {
        let order = self.order.read().await.clone();
        let mut first_error = None;
        for name in order.iter().rev() {
            if let Err(e) = self.stop_one(name).await {
                tracing::warn!(service = %name, error = %e, "failed to stop");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn stop_one(&self, name: &str) -> Result<bool> {
        let Some(handle) = self.handles.write().await.remove(name) else {
            return Ok(false);
        };
        tracing::info!(service = %name, container = %handle.id, "stopping");
        if let Err(e) = self.runtime.stop(&handle).await {
            self.handles.write().await.insert(name.to_string(), handle);
            return Err(e);
        }
        self.emit(LaunchEvent::ContainerStopped {
            service: name.to_string(),
        });
        Ok(true)
    }

    /// Handles of containers currently running under this launcher.
    pub async fn running(&self) -> Vec<ContainerHandle> {
        let handles = self.handles.read().await;
        let order = self.order.read().await;
        order.iter().filter_map(|n| handles.get(n).cloned()).collect()
    }
}
