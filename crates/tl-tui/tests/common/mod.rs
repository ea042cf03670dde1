// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Utc};
use ratatui::{backend::TestBackend, Terminal};

use tl_core::models::{Endpoint, Lifetime, RunState, ServiceSpec, TopologySpec};
use tl_core::services::topology::{compile, Topology};
use tl_tui::app::{App, ServiceRow};
use tl_tui::ui;

/// Render the app to a string using a TestBackend of the given dimensions.
pub fn render_to_string(app: &App, width: u16, height: u16) -> String {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    terminal.draw(|f| ui::render(f, app, None)).unwrap();
    terminal.backend().to_string()
}

/// Render the app with a fixed `now` for deterministic timestamps.
pub fn render_to_string_at(app: &App, width: u16, height: u16, now: DateTime<Utc>) -> String {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    terminal.draw(|f| ui::render(f, app, Some(now))).unwrap();
    terminal.backend().to_string()
}

/// Build a row with the given name and state.
pub fn make_row(name: &str, state: RunState) -> ServiceRow {
    let mut row = ServiceRow::new(name, &format!("example/{name}:latest"));
    row.status.state = state;
    row
}

/// Kafka, Schema Registry (waits for and grouped under Kafka) and Azurite.
pub fn sample_topology() -> Topology {
    let kafka = ServiceSpec {
        name: "kafka".into(),
        image: "confluentinc/cp-kafka".into(),
        tag: Some("7.8.1".into()),
        lifetime: Lifetime::Persistent,
        endpoints: vec![Endpoint::tcp("CLIENT", 9092, 9092)],
        ..Default::default()
    };
    let registry = ServiceSpec {
        name: "schema-registry".into(),
        image: "confluentinc/cp-schema-registry:7.8.1".into(),
        endpoints: vec![Endpoint::http("http", 8081, 8081)],
        wait_for: vec!["kafka".into()],
        parent: Some("kafka".into()),
        ..Default::default()
    };
    let azurite = ServiceSpec {
        name: "azurite".into(),
        image: "mcr.microsoft.com/azure-storage/azurite".into(),
        endpoints: vec![Endpoint::tcp("blob", 10000, 10000)],
        ..Default::default()
    };
    let spec = TopologySpec {
        name: Some("local-dev".into()),
        network: None,
        services: vec![kafka, registry, azurite],
    };
    compile(&spec, Path::new(".")).unwrap()
}
