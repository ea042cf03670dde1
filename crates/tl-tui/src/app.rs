use std::collections::{HashMap, VecDeque};

use tl_core::models::{EdgeKind, LaunchEvent, LogLine, RunState, ServiceStatus};
use tl_core::services::topology::Topology;

/// Host used when rendering endpoint URLs.
pub const ENDPOINT_HOST: &str = "localhost";

/// The active mode determines which UI is shown and how keys are dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    ServiceList,
    ConfirmDialog {
        message: String,
        action: ConfirmAction,
    },
    HelpDialog,
}

/// What a confirmed dialog action should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    StopService(String),
    Quit,
}

/// One row of the service table, with everything the detail panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRow {
    pub name: String,
    pub image: String,
    pub lifetime: String,
    /// `(label, url)` per published endpoint.
    pub endpoints: Vec<(String, String)>,
    pub wait_for: Vec<String>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub status: ServiceStatus,
    /// The container was stopped after launching.
    pub stopped: bool,
}

impl ServiceRow {
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            lifetime: "ephemeral".to_string(),
            endpoints: Vec::new(),
            wait_for: Vec::new(),
            parent: None,
            children: Vec::new(),
            status: ServiceStatus::default(),
            stopped: false,
        }
    }
}

/// Per-service ring buffer of container output.
#[derive(Debug, Default)]
pub struct LogBuffer {
    lines: HashMap<String, VecDeque<String>>,
}

impl LogBuffer {
    const CAPACITY: usize = 2_000;

    pub fn push(&mut self, service: &str, line: String) {
        let lines = self.lines.entry(service.to_string()).or_default();
        if lines.len() >= Self::CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn lines(&self, service: &str) -> Option<&VecDeque<String>> {
        self.lines.get(service)
    }

    pub fn len(&self, service: &str) -> usize {
        self.lines.get(service).map_or(0, VecDeque::len)
    }
}

pub struct App {
    pub mode: Mode,
    pub topology_name: String,
    pub services: Vec<ServiceRow>,
    pub selected_index: usize,
    pub logs: LogBuffer,
    /// One past the last visible log line while not following.
    pub log_scroll: usize,
    pub log_auto_follow: bool,
    pub should_quit: bool,
    pub status_message: Option<String>,
    /// Set once the launcher has settled every service.
    pub launch_finished: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            mode: Mode::ServiceList,
            topology_name: String::new(),
            services: Vec::new(),
            selected_index: 0,
            logs: LogBuffer::default(),
            log_scroll: 0,
            log_auto_follow: true,
            should_quit: false,
            status_message: None,
            launch_finished: false,
        }
    }

    /// Rows in launch order.
    pub fn from_topology(topology: &Topology) -> Self {
        let graph = topology.graph();
        let order: Vec<String> = graph
            .topological_order()
            .unwrap_or_else(|_| graph.services().map(String::from).collect());

        let services = order
            .iter()
            .filter_map(|name| topology.definition(name))
            .map(|def| ServiceRow {
                name: def.name().to_string(),
                image: def.image().to_string(),
                lifetime: def.lifetime().as_str().to_string(),
                endpoints: def.endpoint_urls(ENDPOINT_HOST),
                wait_for: graph
                    .dependencies(def.name(), EdgeKind::WaitFor)
                    .into_iter()
                    .map(String::from)
                    .collect(),
                parent: graph
                    .dependencies(def.name(), EdgeKind::ParentOf)
                    .first()
                    .map(|p| p.to_string()),
                children: graph
                    .children(def.name())
                    .into_iter()
                    .map(String::from)
                    .collect(),
                status: ServiceStatus::default(),
                stopped: false,
            })
            .collect();

        Self {
            topology_name: topology.name().unwrap_or("topology").to_string(),
            services,
            ..Self::new()
        }
    }

    pub fn selected_service(&self) -> Option<&ServiceRow> {
        self.services.get(self.selected_index)
    }

    pub fn select_next(&mut self) {
        if !self.services.is_empty() {
            self.selected_index = (self.selected_index + 1) % self.services.len();
            self.reset_log_scroll();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.services.is_empty() {
            if self.selected_index == 0 {
                self.selected_index = self.services.len() - 1;
            } else {
                self.selected_index -= 1;
            }
            self.reset_log_scroll();
        }
    }

    fn reset_log_scroll(&mut self) {
        self.log_scroll = 0;
        self.log_auto_follow = true;
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    fn row_mut(&mut self, name: &str) -> Option<&mut ServiceRow> {
        self.services.iter_mut().find(|r| r.name == name)
    }

    /// Fold a launcher event into the table.
    pub fn apply_launch_event(&mut self, event: &LaunchEvent) {
        match event {
            LaunchEvent::StateChanged {
                service,
                state,
                reason,
            } => {
                let Some(row) = self.row_mut(service) else {
                    return;
                };
                row.status.state = *state;
                row.status.reason = reason.clone();
                match state {
                    RunState::Starting => row.status.started_at = Some(chrono::Utc::now()),
                    RunState::Ready => row.status.ready_at = Some(chrono::Utc::now()),
                    _ => {}
                }
            }
            LaunchEvent::ContainerStarted { handle } => {
                if let Some(row) = self.row_mut(&handle.service) {
                    row.stopped = false;
                }
            }
            LaunchEvent::ContainerStopped { service } => {
                if let Some(row) = self.row_mut(service) {
                    row.stopped = true;
                }
            }
        }
    }

    /// Replace row statuses with the launcher's authoritative snapshot.
    pub fn apply_statuses<'a>(
        &mut self,
        statuses: impl IntoIterator<Item = (&'a String, &'a ServiceStatus)>,
    ) {
        for (name, status) in statuses {
            if let Some(row) = self.row_mut(name) {
                row.status = status.clone();
            }
        }
    }

    pub fn push_log(&mut self, line: LogLine) {
        self.logs.push(&line.service, line.line);
    }

    /// Ready / total, for the title bar.
    pub fn ready_count(&self) -> usize {
        self.services
            .iter()
            .filter(|r| r.status.state == RunState::Ready && !r.stopped)
            .count()
    }

    /// Scroll the log view up by `lines`, leaving auto-follow.
    pub fn scroll_log_up(&mut self, lines: usize) {
        let Some(row) = self.selected_service() else {
            return;
        };
        let total = self.logs.len(&row.name);
        if self.log_auto_follow {
            self.log_scroll = total;
            self.log_auto_follow = false;
        }
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    pub fn scroll_log_down(&mut self, lines: usize) {
        let Some(row) = self.selected_service() else {
            return;
        };
        let total = self.logs.len(&row.name);
        if self.log_auto_follow {
            return;
        }
        self.log_scroll = (self.log_scroll + lines).min(total);
        if self.log_scroll >= total {
            self.log_auto_follow = true;
        }
    }
}
