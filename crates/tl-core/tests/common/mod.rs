// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use tl_core::error::{LauncherError, Result};
use tl_core::models::{ContainerHandle, LauncherConfig, ServiceDefinition, ServiceSpec, TopologySpec};
use tl_core::services::runtime::ContainerRuntime;
use tl_core::services::topology::{compile, Topology};

/// How a fake container behaves once started.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    ReadyAfter(Duration),
    NeverReady,
    StartFails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Start,
    Ready,
    Stop,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub service: String,
    pub at: Instant,
}

/// In-memory [`ContainerRuntime`] that records every call with the
/// (paused) tokio clock.
#[derive(Default)]
pub struct FakeRuntime {
    behaviors: HashMap<String, Behavior>,
    started: Mutex<HashMap<String, Instant>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRuntime {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: behaviors
                .iter()
                .map(|(name, b)| (name.to_string(), *b))
                .collect(),
            ..Default::default()
        }
    }

    fn behavior(&self, service: &str) -> Behavior {
        self.behaviors
            .get(service)
            .copied()
            .unwrap_or(Behavior::ReadyAfter(Duration::ZERO))
    }

    fn record(&self, kind: CallKind, service: &str) {
        self.calls.lock().unwrap().push(Call {
            kind,
            service: service.to_string(),
            at: Instant::now(),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Services in the order a given call was made for them.
    pub fn services_with(&self, kind: CallKind) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.service)
            .collect()
    }

    pub fn time_of(&self, kind: CallKind, service: &str) -> Option<Instant> {
        self.calls()
            .into_iter()
            .find(|c| c.kind == kind && c.service == service)
            .map(|c| c.at)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn start(&self, definition: &ServiceDefinition) -> Result<ContainerHandle> {
        let name = definition.name();
        if let Behavior::StartFails = self.behavior(name) {
            return Err(LauncherError::Runtime(format!("pull access denied for {}", definition.image())));
        }
        self.record(CallKind::Start, name);
        self.started.lock().unwrap().insert(name.to_string(), Instant::now());
        Ok(ContainerHandle {
            service: name.to_string(),
            id: format!("fake-{name}"),
            lifetime: definition.lifetime(),
        })
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<()> {
        self.record(CallKind::Stop, &handle.service);
        Ok(())
    }

    async fn is_ready(&self, handle: &ContainerHandle) -> Result<bool> {
        let Some(started) = self.started.lock().unwrap().get(&handle.service).copied() else {
            return Ok(false);
        };
        let ready = match self.behavior(&handle.service) {
            Behavior::ReadyAfter(after) => Instant::now() >= started + after,
            Behavior::NeverReady | Behavior::StartFails => false,
        };
        if ready && self.time_of(CallKind::Ready, &handle.service).is_none() {
            self.record(CallKind::Ready, &handle.service);
        }
        Ok(ready)
    }
}

pub fn test_config() -> LauncherConfig {
    LauncherConfig {
        readiness_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(100),
    }
}

pub fn service(name: &str, wait_for: &[&str], parent: Option<&str>) -> ServiceSpec {
    ServiceSpec {
        name: name.into(),
        image: format!("example/{name}"),
        wait_for: wait_for.iter().map(|s| s.to_string()).collect(),
        parent: parent.map(String::from),
        ..Default::default()
    }
}

pub fn topology(services: Vec<ServiceSpec>) -> Topology {
    let spec = TopologySpec {
        name: Some("test".into()),
        network: None,
        services,
    };
    compile(&spec, Path::new(".")).unwrap()
}

/// Storage, Kafka, SchemaRegistry(waitFor Kafka), Notebook(waitFor Storage, Kafka).
pub fn local_dev() -> Topology {
    topology(vec![
        service("azure-storage", &[], None),
        service("kafka", &[], None),
        service("schema-registry", &["kafka"], Some("kafka")),
        service("pyspark-notebook", &["azure-storage", "kafka"], None),
    ])
}
